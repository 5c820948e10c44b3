//! Air hockey demo runner
//!
//! Plays headless games with autopiloted paddles: against the practice AI,
//! or as two peers matched through an in-process lobby and broadcast hub.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use game_core::Config;
use lobby::{
    ChallengeOutcome, Challenges, Clock, LobbyContext, MatchOutcome, Matchmaker, MemoryBackend,
    Presence, Session, SessionEvent, SystemClock,
};
use proto::topic_for;
use tracing::info;

use client::{
    autopilot, telemetry, FrameInput, Identity, MatchPeer, MatchRecorder, MemoryHub, Notice, PracticeGame,
    Settings,
};

#[derive(Parser, Debug)]
#[command(name = "airhockey")]
#[command(version, about = "Headless air hockey runner", long_about = None)]
struct Cli {
    /// Settings file (defaults to the user config dir)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Pace frames in real time instead of running flat out
    #[arg(long, global = true)]
    realtime: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play the built-in opponent
    Practice {
        #[arg(long, default_value_t = 3600)]
        frames: u32,
    },
    /// Two local peers meet in the matchmaking queue and play
    Duel {
        #[arg(long, default_value_t = 3600)]
        frames: u32,
    },
    /// One local peer challenges another
    Challenge {
        /// Have the challenged player decline
        #[arg(long)]
        decline: bool,
    },
    /// Show this device's identity
    Whoami {
        #[arg(long)]
        identity: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match cli.settings.clone().or_else(Settings::default_path) {
        Some(path) => Settings::load(&path).with_context(|| format!("loading {}", path.display()))?,
        None => Settings::default(),
    };
    telemetry::init_tracing(&settings.log);
    info!(version = env!("CARGO_PKG_VERSION"), "starting airhockey");

    match cli.command {
        Command::Practice { frames } => practice(&settings, frames, cli.realtime).await,
        Command::Duel { frames } => duel(&settings, frames, cli.realtime).await,
        Command::Challenge { decline } => challenge(&settings, decline).await,
        Command::Whoami { identity } => whoami(&settings, identity),
    }
}

struct Pacer {
    interval: Option<tokio::time::Interval>,
}

impl Pacer {
    fn new(frame_ms: u64, realtime: bool) -> Self {
        Self {
            interval: realtime.then(|| tokio::time::interval(Duration::from_millis(frame_ms.max(1)))),
        }
    }

    async fn tick(&mut self) {
        match &mut self.interval {
            Some(interval) => {
                interval.tick().await;
            }
            None => tokio::task::yield_now().await,
        }
    }
}

async fn practice(settings: &Settings, frames: u32, realtime: bool) -> anyhow::Result<()> {
    let mut game = PracticeGame::new(Config::new());
    let mut pacer = Pacer::new(settings.sync.frame_interval_ms, realtime);

    for _ in 0..frames {
        pacer.tick().await;
        let mut paddle = *game.table.paddles.get(PracticeGame::HUMAN);
        game_core::systems::drive_ai_paddle(&mut paddle, &game.table.puck, &game.config);
        let pointer = if game.table.puck.speed() < 0.5 {
            game.table.puck.pos
        } else {
            paddle.pos
        };
        let out = game.frame(Some(pointer));
        if let Some(scorer) = out.goal {
            info!(?scorer, player1 = out.score.player1, player2 = out.score.player2, "goal");
        }
        if out.winner.is_some() {
            break;
        }
    }

    let score = game.table.score;
    println!("practice over: AI {} - you {}", score.player1, score.player2);
    Ok(())
}

fn lobby_context(settings: &Settings) -> LobbyContext<MemoryBackend> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    LobbyContext::new(Arc::new(MemoryBackend::new()), clock, settings.lobby.clone())
}

async fn duel(settings: &Settings, frames: u32, realtime: bool) -> anyhow::Result<()> {
    let ctx = lobby_context(settings);
    let host_id = Identity::generate();
    let guest_id = Identity::generate();

    let host_presence = Presence::new(ctx.clone(), host_id.device_id.clone(), &host_id.nickname);
    let guest_presence = Presence::new(ctx.clone(), guest_id.device_id.clone(), &guest_id.nickname);
    host_presence.go_online().await?;
    guest_presence.go_online().await?;
    let _host_beat = host_presence.spawn_heartbeat();
    let _guest_beat = guest_presence.spawn_heartbeat();

    let mut host = Matchmaker::new(ctx.clone(), host_id.device_id.clone());
    let mut guest = Matchmaker::new(ctx.clone(), guest_id.device_id.clone());

    let created = host.find_match().await?;
    let joined = guest.find_match().await?;
    let MatchOutcome::Joined(session) = joined else {
        anyhow::bail!("guest opened a second room instead of joining {}", created.session().id);
    };
    match host.next_event().await? {
        SessionEvent::OpponentJoined(_) => {}
        other => anyhow::bail!("host saw {other:?} instead of a joiner"),
    }
    info!(room = %session.id, "matched");

    let mut host = play(settings, &session, host, &guest, frames, realtime).await?;

    guest.leave().await?;
    if let Some(notice) = Notice::from_session_event(&host.next_event().await?) {
        println!("{notice}");
    }
    host.leave().await?;
    host_presence.go_offline().await?;
    guest_presence.go_offline().await?;
    Ok(())
}

async fn play(
    settings: &Settings,
    session: &Session,
    host: Matchmaker<MemoryBackend>,
    guest: &Matchmaker<MemoryBackend>,
    frames: u32,
    realtime: bool,
) -> anyhow::Result<Matchmaker<MemoryBackend>> {
    let hub = MemoryHub::new(settings.sync.hub_capacity);
    let topic = topic_for(&session.id);
    let config = Config::new();
    let mut authority = MatchPeer::new(session, host.me(), hub.join(&topic), config.clone(), &settings.sync)?;
    let mut follower = MatchPeer::new(session, guest.me(), hub.join(&topic), config.clone(), &settings.sync)?;
    let recorder = MatchRecorder::spawn(host);

    let mut pacer = Pacer::new(settings.sync.frame_interval_ms, realtime);
    let started = std::time::Instant::now();
    for _ in 0..frames {
        pacer.tick().await;
        let now_ms = started.elapsed().as_millis() as u64;

        let pointer = autopilot(authority.view(), &config);
        let out = authority.frame(FrameInput { pointer: Some(pointer), now_ms });
        let pointer = autopilot(follower.view(), &config);
        follower.frame(FrameInput { pointer: Some(pointer), now_ms });

        if out.goal.is_some() {
            info!(player1 = out.score.player1, player2 = out.score.player2, "goal");
            recorder.record(authority.view().table());
        }
        if let Some(winner) = out.winner {
            info!(?winner, "match won");
            break;
        }
    }

    let seen_by_host = authority.view().table().score;
    let seen_by_guest = follower.view().table().score;
    println!(
        "final score {}-{} (guest sees {}-{})",
        seen_by_host.player1, seen_by_host.player2, seen_by_guest.player1, seen_by_guest.player2
    );
    authority.leave();
    follower.leave();
    Ok(recorder.finish().await?)
}

async fn challenge(settings: &Settings, decline: bool) -> anyhow::Result<()> {
    let ctx = lobby_context(settings);
    let alice = Identity::generate();
    let bob = Identity::generate();
    for identity in [&alice, &bob] {
        Presence::new(ctx.clone(), identity.device_id.clone(), &identity.nickname)
            .go_online()
            .await?;
    }

    let challenger = Challenges::new(ctx.clone(), alice.device_id.clone());
    let challenged = Challenges::new(ctx.clone(), bob.device_id.clone());
    let mut inbox = challenged.subscribe_incoming();

    let request = challenger.send(&bob.device_id).await?;
    let mut watch = challenger.watch(&request);
    let Some(incoming) = challenged.next_incoming(&mut inbox).await else {
        anyhow::bail!("challenge never arrived");
    };
    println!("{} challenged {}", incoming.challenger_nickname, incoming.challenged_nickname);

    if decline {
        challenged.decline(&incoming.id).await?;
    } else {
        challenged.accept(&incoming.id).await?;
    }

    let outcome = challenger.next_outcome(&request, &mut watch).await?;
    match &outcome {
        ChallengeOutcome::Accepted(session) => {
            let mut alice_match = Matchmaker::new(ctx.clone(), alice.device_id.clone());
            alice_match.adopt(session.clone()).await?;
            println!("room {} is ready, {} serves", session.id, alice.nickname);
            alice_match.leave().await?;
        }
        other => match Notice::from_challenge(other) {
            Some(notice) => println!("{notice}"),
            None => println!("challenge withdrawn"),
        },
    }
    Ok(())
}

fn whoami(settings: &Settings, identity: Option<PathBuf>) -> anyhow::Result<()> {
    let path = identity
        .or_else(|| settings.identity_path.clone())
        .or_else(Identity::default_path)
        .context("no data directory for the identity file")?;
    let mut identity = Identity::load_or_create(&path)?;
    if let Some(nickname) = &settings.nickname {
        identity.nickname = nickname.clone();
    }
    println!("{} ({})", identity.nickname, identity.device_id);
    Ok(())
}

//! The per-frame loop of one peer in a networked match.
//!
//! Every frame: take in what the other peer sent, apply our own pointer,
//! publish our paddle, and, on the authority only, step the physics and
//! publish the puck, score and sounds. Nothing here waits on the network.

use game_core::systems::apply_paddle_input;
use game_core::{step, Config, Events, Paddles, PlayerSlot, Puck, Score, TableState};
use glam::Vec2;
use lobby::{LobbyError, Session};
use proto::{PlayerId, SoundKind, SyncMessage};
use tracing::info;

use crate::authority::{Role, Seat};
use crate::channel::{SyncChannel, Transport};
use crate::error::Result;
use crate::network::{self, Handled};
use crate::settings::SyncSettings;
use crate::state::MatchView;
use crate::throttle::PaddleThrottle;

/// Input for one frame
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    /// Pointer position in table coordinates, if the player is dragging
    pub pointer: Option<Vec2>,
    pub now_ms: u64,
}

/// What the renderer and audio need after a frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub puck: Puck,
    pub paddles: Paddles,
    pub score: Score,
    pub cues: Vec<SoundKind>,
    /// Scorer of a goal seen this frame
    pub goal: Option<PlayerSlot>,
    pub winner: Option<PlayerSlot>,
}

impl FrameOutput {
    pub fn new(table: &TableState, config: &Config, cues: Vec<SoundKind>, goal: Option<PlayerSlot>) -> Self {
        Self {
            puck: table.puck,
            paddles: table.paddles,
            score: table.score,
            cues,
            goal,
            winner: table.score.has_winner(config.win_score),
        }
    }
}

pub struct MatchPeer<T> {
    config: Config,
    view: MatchView,
    channel: SyncChannel<T>,
    throttle: PaddleThrottle,
    events: Events,
    score_refresh_frames: u32,
    frames_since_score: u32,
}

impl<T: Transport> MatchPeer<T> {
    /// Seat ourselves in `session`; fails unless we are one of its two players
    pub fn new(session: &Session, me: &PlayerId, transport: T, config: Config, sync: &SyncSettings) -> Result<Self> {
        let seat = Seat::resolve(session, me).ok_or_else(|| LobbyError::PlayerUnavailable(me.clone()))?;
        info!(
            room = %session.id,
            player = %me,
            role = ?seat.role,
            topic = %transport.topic(),
            "match started"
        );
        Ok(Self {
            view: MatchView::new(seat, &config),
            config,
            channel: SyncChannel::new(me.clone(), transport),
            throttle: PaddleThrottle::new(sync.paddle_interval_ms, sync.paddle_refresh_ms),
            events: Events::new(),
            score_refresh_frames: sync.score_refresh_frames.max(1),
            frames_since_score: 0,
        })
    }

    pub fn seat(&self) -> &Seat {
        self.view.seat()
    }

    pub fn role(&self) -> Role {
        self.view.seat().role
    }

    pub fn view(&self) -> &MatchView {
        &self.view
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one frame
    pub fn frame(&mut self, input: FrameInput) -> FrameOutput {
        let mut cues = Vec::new();
        let mut goal = None;

        for envelope in self.channel.drain() {
            match network::handle_message(envelope, &mut self.view) {
                Handled::Cue(kind) => cues.push(kind),
                Handled::Goal(slot) => goal = Some(slot),
                Handled::Applied | Handled::Ignored => {}
            }
        }

        let slot = self.view.seat().slot;
        if let Some(pointer) = input.pointer {
            apply_paddle_input(&mut self.view.table_mut().paddles, slot, pointer, &self.config);
        }
        let mine = self.view.my_paddle().pos;
        if let Some(pos) = self.throttle.poll(mine, input.now_ms) {
            self.channel.send(network::paddle_move(&self.view.seat().me, pos));
        }

        if self.role().is_authority() {
            self.simulate(&mut cues, &mut goal);
        }

        self.view.end_frame();
        FrameOutput::new(self.view.table(), &self.config, cues, goal)
    }

    fn simulate(&mut self, cues: &mut Vec<SoundKind>, goal: &mut Option<PlayerSlot>) {
        step(self.view.table_mut(), &self.config, &mut self.events);

        for event in self.events.iter() {
            let kind = network::sound_for(event);
            cues.push(kind);
            self.channel.send(SyncMessage::Sound { kind });
        }
        if let Some(scorer) = self.events.goal() {
            *goal = Some(scorer);
        }

        let table = self.view.table();
        self.channel.send(network::puck_update(&table.puck));

        self.frames_since_score += 1;
        if goal.is_some() || self.frames_since_score >= self.score_refresh_frames {
            self.channel.send(network::score_update(&table.score));
            self.frames_since_score = 0;
        }
    }

    /// Leave the broadcast topic. Idempotent.
    pub fn leave(&mut self) {
        self.channel.leave();
    }
}

//! Presence records and the heartbeat that keeps them alive.
//!
//! Liveness is decided at read time: a record whose `last_seen` is older than
//! the configured window is ignored whatever its stored status says. The
//! heartbeat task never coordinates with readers.

use proto::PlayerId;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{LobbyError, Result};
use crate::records::{PresenceRecord, PresenceStatus};
use crate::store::{Backend, Table};
use crate::LobbyContext;

/// This peer's presence in the lobby
pub struct Presence<B> {
    ctx: LobbyContext<B>,
    me: PlayerId,
    nickname: String,
}

impl<B: Backend> Presence<B> {
    pub fn new(ctx: LobbyContext<B>, me: PlayerId, nickname: impl Into<String>) -> Self {
        Self {
            ctx,
            me,
            nickname: nickname.into(),
        }
    }

    pub fn me(&self) -> &PlayerId {
        &self.me
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Announce ourselves as online and free to play
    pub async fn go_online(&self) -> Result<PresenceRecord> {
        let record = PresenceRecord {
            device_id: self.me.clone(),
            nickname: self.nickname.clone(),
            status: PresenceStatus::Online,
            last_seen: self.ctx.now(),
        };
        let record = self.ctx.backend.presence().upsert(record).await?;
        info!(player = %self.me, nickname = %self.nickname, "online");
        Ok(record)
    }

    /// Refresh `last_seen`, recreating the record if it was removed
    pub async fn heartbeat(&self) -> Result<()> {
        let now = self.ctx.now();
        match self
            .ctx
            .backend
            .presence()
            .update_if(self.me.as_str(), |_| true, |r| r.last_seen = now)
            .await
        {
            Ok(_) => Ok(()),
            Err(LobbyError::NotFound { .. }) => self.go_online().await.map(|_| ()),
            Err(e) => Err(e),
        }
    }

    pub async fn set_status(&self, status: PresenceStatus) -> Result<()> {
        set_status(&self.ctx, &self.me, status).await
    }

    /// Remove our record. Safe to call repeatedly.
    pub async fn go_offline(&self) -> Result<()> {
        self.ctx
            .backend
            .presence()
            .delete_if(self.me.as_str(), |_| true)
            .await?;
        info!(player = %self.me, "offline");
        Ok(())
    }

    /// Fresh records of everyone but us, ordered by nickname
    pub async fn online_players(&self) -> Result<Vec<PresenceRecord>> {
        let now = self.ctx.now();
        let ttl = self.ctx.config.presence_ttl_ms;
        let mut players: Vec<_> = self
            .ctx
            .backend
            .presence()
            .list()
            .await?
            .into_iter()
            .filter(|r| r.device_id != self.me && r.is_fresh(now, ttl))
            .collect();
        players.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        Ok(players)
    }

    /// A player's record, or `None` if missing or stale
    pub async fn lookup(&self, player: &PlayerId) -> Result<Option<PresenceRecord>> {
        lookup(&self.ctx, player).await
    }
}

impl<B: Backend> Presence<B> {
    /// Refresh our record every heartbeat interval until the handle is stopped
    pub fn spawn_heartbeat(&self) -> HeartbeatHandle {
        let presence = Presence {
            ctx: self.ctx.clone(),
            me: self.me.clone(),
            nickname: self.nickname.clone(),
        };
        let period = self.ctx.config.heartbeat_interval();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match presence.heartbeat().await {
                    Ok(()) => debug!(player = %presence.me, "heartbeat"),
                    Err(e) => warn!(player = %presence.me, error = %e, "heartbeat failed"),
                }
            }
        });
        HeartbeatHandle { task }
    }
}

/// Running heartbeat task; stops when dropped
pub struct HeartbeatHandle {
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    pub fn stop(self) {}

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Fresh presence record for any player
pub(crate) async fn lookup<B: Backend>(
    ctx: &LobbyContext<B>,
    player: &PlayerId,
) -> Result<Option<PresenceRecord>> {
    let now = ctx.now();
    let ttl = ctx.config.presence_ttl_ms;
    Ok(ctx
        .backend
        .presence()
        .get(player.as_str())
        .await?
        .filter(|r| r.is_fresh(now, ttl)))
}

/// Set any player's status. A missing record is left missing.
pub(crate) async fn set_status<B: Backend>(
    ctx: &LobbyContext<B>,
    player: &PlayerId,
    status: PresenceStatus,
) -> Result<()> {
    // Only heartbeats count as liveness; last_seen is left alone
    match ctx
        .backend
        .presence()
        .update_if(player.as_str(), |_| true, |r| r.status = status)
        .await
    {
        Ok(_) => {
            debug!(player = %player, ?status, "presence status");
            Ok(())
        }
        Err(LobbyError::NotFound { .. }) => {
            debug!(player = %player, ?status, "no presence record to update");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Put a `busy` player back to `online`. Any other status is left alone.
pub(crate) async fn release_busy<B: Backend>(ctx: &LobbyContext<B>, player: &PlayerId) -> Result<()> {
    match ctx
        .backend
        .presence()
        .update_if(
            player.as_str(),
            |r| r.status == PresenceStatus::Busy,
            |r| r.status = PresenceStatus::Online,
        )
        .await
    {
        Ok(_) => {
            debug!(player = %player, "released from busy");
            Ok(())
        }
        Err(e) if e.is_conflict() => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LobbyConfig, ManualClock, MemoryBackend};
    use std::sync::Arc;

    fn setup() -> (Arc<ManualClock>, LobbyContext<MemoryBackend>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let ctx = LobbyContext::new(
            Arc::new(MemoryBackend::new()),
            clock.clone(),
            LobbyConfig::default(),
        );
        (clock, ctx)
    }

    #[tokio::test]
    async fn test_online_players_excludes_self_and_stale() {
        let (clock, ctx) = setup();
        let alice = Presence::new(ctx.clone(), "alice".into(), "Alice");
        let bob = Presence::new(ctx.clone(), "bob".into(), "Bob");
        let carol = Presence::new(ctx.clone(), "carol".into(), "Carol");

        carol.go_online().await.unwrap();
        clock.advance(10_000);
        alice.go_online().await.unwrap();
        bob.go_online().await.unwrap();
        clock.advance(6_000);

        let seen: Vec<_> = alice
            .online_players()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.nickname)
            .collect();
        assert_eq!(seen, vec!["Bob".to_string()], "Carol is 16s stale");
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_record_fresh() {
        let (clock, ctx) = setup();
        let alice = Presence::new(ctx.clone(), "alice".into(), "Alice");
        let bob = Presence::new(ctx.clone(), "bob".into(), "Bob");
        alice.go_online().await.unwrap();

        for _ in 0..5 {
            clock.advance(5_000);
            alice.heartbeat().await.unwrap();
        }

        let found = bob.lookup(&"alice".into()).await.unwrap();
        assert!(found.is_some(), "Heartbeats keep alice visible after 25s");
    }

    #[tokio::test]
    async fn test_heartbeat_recreates_missing_record() {
        let (_clock, ctx) = setup();
        let alice = Presence::new(ctx.clone(), "alice".into(), "Alice");
        alice.heartbeat().await.unwrap();
        let record = alice.lookup(&"alice".into()).await.unwrap().unwrap();
        assert_eq!(record.status, PresenceStatus::Online);
    }

    #[tokio::test]
    async fn test_go_offline_is_idempotent() {
        let (_clock, ctx) = setup();
        let alice = Presence::new(ctx.clone(), "alice".into(), "Alice");
        alice.go_online().await.unwrap();
        alice.go_offline().await.unwrap();
        alice.go_offline().await.unwrap();
        assert!(alice.lookup(&"alice".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_status_without_record_is_noop() {
        let (_clock, ctx) = setup();
        let alice = Presence::new(ctx.clone(), "alice".into(), "Alice");
        alice.set_status(PresenceStatus::Busy).await.unwrap();
        assert!(alice.lookup(&"alice".into()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_heartbeat_runs_until_dropped() {
        let (clock, ctx) = setup();
        let alice = Presence::new(ctx.clone(), "alice".into(), "Alice");
        alice.go_online().await.unwrap();

        let handle = alice.spawn_heartbeat();
        clock.advance(60_000);
        tokio::time::sleep(ctx.config.heartbeat_interval() * 2).await;
        assert!(handle.is_running());
        assert!(
            alice.lookup(&"alice".into()).await.unwrap().is_some(),
            "Background heartbeat refreshed last_seen"
        );

        handle.stop();
        clock.advance(60_000);
        tokio::time::sleep(ctx.config.heartbeat_interval() * 2).await;
        assert!(alice.lookup(&"alice".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_change_does_not_revive_stale_record() {
        let (clock, ctx) = setup();
        let alice = Presence::new(ctx.clone(), "alice".into(), "Alice");
        alice.go_online().await.unwrap();
        clock.advance(20_000);

        alice.set_status(PresenceStatus::InGame).await.unwrap();

        assert!(alice.lookup(&"alice".into()).await.unwrap().is_none(), "Still stale");
        let stored = ctx.backend.presence().get("alice").await.unwrap().unwrap();
        assert_eq!(stored.status, PresenceStatus::InGame);
        assert_eq!(stored.last_seen, 1_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_heartbeat_keeps_running() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let config = LobbyConfig {
            heartbeat_interval_ms: 0,
            ..LobbyConfig::default()
        };
        let ctx = LobbyContext::new(Arc::new(MemoryBackend::new()), clock.clone(), config);
        let alice = Presence::new(ctx.clone(), "alice".into(), "Alice");
        alice.go_online().await.unwrap();

        let handle = alice.spawn_heartbeat();
        clock.advance(60_000);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(handle.is_running());
        assert!(alice.lookup(&"alice".into()).await.unwrap().is_some());
    }
}

//! Direct challenges between two online players.
//!
//! A request moves `pending -> accepted | declined | expired` exactly once.
//! Every answer is a conditional write on the pending row, so when both sides
//! act at the same time only one of them takes effect.

use std::time::Duration;

use proto::PlayerId;
use tracing::{debug, info, warn};

use crate::error::{LobbyError, Result};
use crate::presence;
use crate::records::{
    generate_room_code, ChallengeRequest, ChallengeStatus, GameStateRow, PresenceStatus, Session,
};
use crate::store::{Backend, Change, Filter, Record, Subscription, Table};
use crate::LobbyContext;

const CREATE_ATTEMPTS: u32 = 8;

/// How a sent challenge was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeOutcome {
    Accepted(Session),
    Declined(ChallengeRequest),
    Expired(ChallengeRequest),
    /// The request disappeared, normally because we cancelled it
    Withdrawn,
}

/// Challenge operations on behalf of one player
pub struct Challenges<B> {
    ctx: LobbyContext<B>,
    me: PlayerId,
}

impl<B: Backend> Challenges<B> {
    pub fn new(ctx: LobbyContext<B>, me: PlayerId) -> Self {
        Self { ctx, me }
    }

    pub fn me(&self) -> &PlayerId {
        &self.me
    }

    /// Challenge a fresh, online player. We are `busy` until it resolves.
    pub async fn send(&self, target: &PlayerId) -> Result<ChallengeRequest> {
        if target == &self.me {
            return Err(LobbyError::PlayerUnavailable(target.clone()));
        }
        let now = self.ctx.now();
        let ttl = self.ctx.config.presence_ttl_ms;
        let mine = presence::lookup(&self.ctx, &self.me)
            .await?
            .ok_or_else(|| LobbyError::PlayerUnavailable(self.me.clone()))?;
        let theirs = presence::lookup(&self.ctx, target)
            .await?
            .filter(|r| r.is_available(now, ttl))
            .ok_or_else(|| LobbyError::PlayerUnavailable(target.clone()))?;

        presence::set_status(&self.ctx, &self.me, PresenceStatus::Busy).await?;
        let request = ChallengeRequest::new(&mine, &theirs, now, self.ctx.config.challenge_ttl_ms);
        match self.ctx.backend.challenges().insert(request).await {
            Ok(request) => {
                info!(
                    challenge = %request.id,
                    from = %self.me,
                    to = %target,
                    "challenge sent"
                );
                Ok(request)
            }
            Err(e) => {
                presence::release_busy(&self.ctx, &self.me).await?;
                Err(e)
            }
        }
    }

    /// Withdraw a request we sent while it is still pending. Idempotent.
    pub async fn cancel(&self, request_id: &str) -> Result<()> {
        let challenges = self.ctx.backend.challenges();
        if let Some(request) = challenges.get(request_id).await? {
            if request.challenger_id != self.me {
                return Err(not_yours(request_id, "only the challenger can withdraw"));
            }
        }
        match challenges
            .delete_if(request_id, |r| r.status == ChallengeStatus::Pending)
            .await
        {
            Ok(removed) => {
                if removed.is_some() {
                    info!(challenge = %request_id, "challenge cancelled");
                }
                presence::release_busy(&self.ctx, &self.me).await
            }
            Err(e) if e.is_conflict() => {
                debug!(challenge = %request_id, "challenge already answered");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn pending_for_me(&self, request_id: &str) -> Result<ChallengeRequest> {
        let request = self
            .ctx
            .backend
            .challenges()
            .get(request_id)
            .await?
            .ok_or_else(|| LobbyError::NotFound {
                table: ChallengeRequest::TABLE,
                key: request_id.to_string(),
            })?;
        if request.challenged_id != self.me {
            return Err(not_yours(request_id, "only the challenged player can answer"));
        }
        match request.effective_status(self.ctx.now()) {
            ChallengeStatus::Pending => Ok(request),
            ChallengeStatus::Expired => Err(LobbyError::ChallengeExpired(request.id)),
            status => Err(LobbyError::IllegalTransition {
                table: ChallengeRequest::TABLE,
                key: request.id,
                reason: format!("challenge is already {status:?}"),
            }),
        }
    }

    /// Accept a pending challenge and open the room for it.
    ///
    /// The challenger becomes player1. If the request changes under us the
    /// room is removed again, so a lost race never leaves a duplicate room.
    pub async fn accept(&self, request_id: &str) -> Result<Session> {
        let request = self.pending_for_me(request_id).await?;
        let session = self.create_room(&request).await?;

        let now = self.ctx.now();
        let room_id = session.id.clone();
        let marked = self
            .ctx
            .backend
            .challenges()
            .update_if(
                request_id,
                |r| r.is_actionable(now),
                |r| {
                    r.status = ChallengeStatus::Accepted;
                    r.room_id = Some(room_id);
                },
            )
            .await;

        if let Err(e) = marked {
            warn!(challenge = %request_id, room = %session.id, error = %e, "accept lost, removing room");
            self.ctx.backend.sessions().delete_if(&session.id, |_| true).await?;
            self.ctx.backend.game_states().delete_if(&session.id, |_| true).await?;
            return Err(if e.is_conflict() {
                LobbyError::ChallengeExpired(request_id.to_string())
            } else {
                e
            });
        }

        presence::set_status(&self.ctx, &request.challenger_id, PresenceStatus::InGame).await?;
        presence::set_status(&self.ctx, &self.me, PresenceStatus::InGame).await?;
        info!(challenge = %request_id, room = %session.id, "challenge accepted");
        Ok(session)
    }

    async fn create_room(&self, request: &ChallengeRequest) -> Result<Session> {
        let sessions = self.ctx.backend.sessions();
        for _ in 0..CREATE_ATTEMPTS {
            let now = self.ctx.now();
            let session = Session::playing(
                generate_room_code(),
                request.challenger_id.clone(),
                self.me.clone(),
                now,
            );
            match sessions.insert(session).await {
                Ok(session) => {
                    self.ctx
                        .backend
                        .game_states()
                        .upsert(GameStateRow::initial(session.id.clone(), now))
                        .await?;
                    return Ok(session);
                }
                Err(LobbyError::Conflict { key, .. }) => debug!(room = %key, "room code taken"),
                Err(e) => return Err(e),
            }
        }
        Err(LobbyError::Backend("no free room code".to_string()))
    }

    /// Turn a challenge down. Answering one that is already gone is not an error.
    pub async fn decline(&self, request_id: &str) -> Result<()> {
        let challenges = self.ctx.backend.challenges();
        let Some(request) = challenges.get(request_id).await? else {
            debug!(challenge = %request_id, "nothing to decline");
            return Ok(());
        };
        if request.challenged_id != self.me {
            return Err(not_yours(request_id, "only the challenged player can answer"));
        }

        let now = self.ctx.now();
        match challenges
            .update_if(
                request_id,
                move |r| r.is_actionable(now),
                |r| r.status = ChallengeStatus::Declined,
            )
            .await
        {
            Ok(request) => {
                info!(challenge = %request_id, "challenge declined");
                presence::release_busy(&self.ctx, &request.challenger_id).await
            }
            Err(e) if e.is_conflict() => {
                debug!(challenge = %request_id, "already answered");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Pending requests addressed to us, oldest first
    pub async fn incoming(&self) -> Result<Vec<ChallengeRequest>> {
        let now = self.ctx.now();
        let mut requests: Vec<_> = self
            .ctx
            .backend
            .challenges()
            .list()
            .await?
            .into_iter()
            .filter(|r| r.challenged_id == self.me && r.is_actionable(now))
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    /// Feed of changes to requests addressed to us
    pub fn subscribe_incoming(&self) -> Subscription<ChallengeRequest> {
        let me = self.me.clone();
        self.ctx
            .backend
            .challenges()
            .subscribe(Filter::matching(move |r: &ChallengeRequest| r.challenged_id == me))
    }

    /// Next newly arrived request that can still be answered
    pub async fn next_incoming(
        &self,
        feed: &mut Subscription<ChallengeRequest>,
    ) -> Option<ChallengeRequest> {
        while let Some(change) = feed.next().await {
            if let Change::Inserted(request) = change {
                if request.is_actionable(self.ctx.now()) {
                    return Some(request);
                }
            }
        }
        None
    }

    /// Feed of changes to a request we sent
    pub fn watch(&self, request: &ChallengeRequest) -> Subscription<ChallengeRequest> {
        self.ctx
            .backend
            .challenges()
            .subscribe(Filter::key(request.id.clone()))
    }

    /// Resolution of a sent request, or `None` while it is still pending
    pub async fn check_sent(&self, request_id: &str) -> Result<Option<ChallengeOutcome>> {
        let Some(request) = self.ctx.backend.challenges().get(request_id).await? else {
            return Ok(Some(ChallengeOutcome::Withdrawn));
        };
        self.resolve(request).await
    }

    async fn resolve(&self, request: ChallengeRequest) -> Result<Option<ChallengeOutcome>> {
        match request.effective_status(self.ctx.now()) {
            ChallengeStatus::Pending => Ok(None),
            ChallengeStatus::Accepted => {
                let room_id = request.room_id.clone().unwrap_or_default();
                let session = self
                    .ctx
                    .backend
                    .sessions()
                    .get(&room_id)
                    .await?
                    .ok_or_else(|| LobbyError::NotFound {
                        table: Session::TABLE,
                        key: room_id,
                    })?;
                Ok(Some(ChallengeOutcome::Accepted(session)))
            }
            ChallengeStatus::Declined => {
                presence::release_busy(&self.ctx, &self.me).await?;
                Ok(Some(ChallengeOutcome::Declined(request)))
            }
            ChallengeStatus::Expired => {
                self.expire(&request.id).await?;
                presence::release_busy(&self.ctx, &self.me).await?;
                Ok(Some(ChallengeOutcome::Expired(request)))
            }
        }
    }

    /// Wait until a sent request is answered or runs out of time
    pub async fn next_outcome(
        &self,
        request: &ChallengeRequest,
        feed: &mut Subscription<ChallengeRequest>,
    ) -> Result<ChallengeOutcome> {
        if let Some(outcome) = self.check_sent(&request.id).await? {
            return Ok(outcome);
        }
        loop {
            let remaining = request.expires_at.saturating_sub(self.ctx.now());
            match tokio::time::timeout(Duration::from_millis(remaining), feed.next()).await {
                Err(_) => {
                    debug!(challenge = %request.id, "challenge timed out");
                    self.expire(&request.id).await?;
                    presence::release_busy(&self.ctx, &self.me).await?;
                    let expired = self
                        .ctx
                        .backend
                        .challenges()
                        .get(&request.id)
                        .await?
                        .unwrap_or_else(|| request.clone());
                    return match expired.status {
                        ChallengeStatus::Accepted => Ok(self
                            .resolve(expired)
                            .await?
                            .unwrap_or(ChallengeOutcome::Withdrawn)),
                        _ => Ok(ChallengeOutcome::Expired(expired)),
                    };
                }
                Ok(None) | Ok(Some(Change::Deleted(_))) => return Ok(ChallengeOutcome::Withdrawn),
                Ok(Some(Change::Inserted(_))) => continue,
                Ok(Some(Change::Updated(updated))) => {
                    if let Some(outcome) = self.resolve(updated).await? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    /// Persist `expired` on a request that is still pending
    async fn expire(&self, request_id: &str) -> Result<()> {
        match self
            .ctx
            .backend
            .challenges()
            .update_if(
                request_id,
                |r| r.status == ChallengeStatus::Pending,
                |r| r.status = ChallengeStatus::Expired,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Write `expired` on every pending request past its deadline.
    /// Returns how many were expired by this call.
    pub async fn expire_stale(&self) -> Result<usize> {
        let now = self.ctx.now();
        let stale: Vec<_> = self
            .ctx
            .backend
            .challenges()
            .list()
            .await?
            .into_iter()
            .filter(|r| r.status == ChallengeStatus::Pending && now >= r.expires_at)
            .collect();

        let mut expired = 0;
        for request in stale {
            match self
                .ctx
                .backend
                .challenges()
                .update_if(
                    &request.id,
                    |r| r.status == ChallengeStatus::Pending && now >= r.expires_at,
                    |r| r.status = ChallengeStatus::Expired,
                )
                .await
            {
                Ok(_) => {
                    expired += 1;
                    presence::release_busy(&self.ctx, &request.challenger_id).await?;
                }
                Err(e) if e.is_conflict() => {}
                Err(e) => return Err(e),
            }
        }
        if expired > 0 {
            info!(expired, "expired stale challenges");
        }
        Ok(expired)
    }
}

fn not_yours(request_id: &str, reason: &str) -> LobbyError {
    LobbyError::IllegalTransition {
        table: ChallengeRequest::TABLE,
        key: request_id.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PresenceRecord;
    use crate::{LobbyConfig, ManualClock, MemoryBackend, MemoryTable, Presence};
    use std::sync::Arc;

    struct Lobby {
        clock: Arc<ManualClock>,
        ctx: LobbyContext<MemoryBackend>,
    }

    impl Lobby {
        async fn new() -> Self {
            let clock = Arc::new(ManualClock::new(1_000_000));
            let ctx = LobbyContext::new(
                Arc::new(MemoryBackend::new()),
                clock.clone(),
                LobbyConfig::default(),
            );
            for (id, nick) in [("alice", "Alice"), ("bob", "Bob")] {
                Presence::new(ctx.clone(), id.into(), nick)
                    .go_online()
                    .await
                    .unwrap();
            }
            Self { clock, ctx }
        }

        fn challenges(&self, id: &str) -> Challenges<MemoryBackend> {
            Challenges::new(self.ctx.clone(), id.into())
        }

        async fn presence(&self, id: &str) -> PresenceRecord {
            self.ctx.backend.presence().get(id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_send_marks_challenger_busy() {
        let lobby = Lobby::new().await;
        let request = lobby.challenges("alice").send(&"bob".into()).await.unwrap();

        assert_eq!(request.status, ChallengeStatus::Pending);
        assert_eq!(request.challenged_nickname, "Bob");
        assert_eq!(request.expires_at, request.created_at + 30_000);
        assert_eq!(lobby.presence("alice").await.status, PresenceStatus::Busy);
    }

    #[tokio::test]
    async fn test_cannot_challenge_busy_or_stale_player() {
        let lobby = Lobby::new().await;
        lobby.challenges("alice").send(&"bob".into()).await.unwrap();

        let carol = Presence::new(lobby.ctx.clone(), "carol".into(), "Carol");
        carol.go_online().await.unwrap();
        let err = lobby.challenges("carol").send(&"alice".into()).await.unwrap_err();
        assert!(matches!(err, LobbyError::PlayerUnavailable(ref p) if p.as_str() == "alice"));

        lobby.clock.advance(20_000);
        carol.heartbeat().await.unwrap();
        let err = lobby.challenges("carol").send(&"bob".into()).await.unwrap_err();
        assert!(matches!(err, LobbyError::PlayerUnavailable(_)), "Bob went stale");
    }

    #[tokio::test]
    async fn test_accept_creates_one_playing_session() {
        let lobby = Lobby::new().await;
        let alice = lobby.challenges("alice");
        let bob = lobby.challenges("bob");
        let request = alice.send(&"bob".into()).await.unwrap();

        let session = bob.accept(&request.id).await.unwrap();
        assert_eq!(session.player1_id, PlayerId::new("alice"));
        assert_eq!(session.player2_id, Some(PlayerId::new("bob")));
        assert!(session.is_ready());

        let Some(ChallengeOutcome::Accepted(seen)) = alice.check_sent(&request.id).await.unwrap() else {
            panic!("Challenger should see the accepted room");
        };
        assert_eq!(seen.id, session.id);
        assert_eq!(lobby.presence("alice").await.status, PresenceStatus::InGame);
        assert_eq!(lobby.presence("bob").await.status, PresenceStatus::InGame);

        assert!(bob.accept(&request.id).await.is_err(), "Second accept fails");
        assert_eq!(lobby.ctx.backend.sessions().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decline_restores_challenger() {
        let lobby = Lobby::new().await;
        let alice = lobby.challenges("alice");
        let request = alice.send(&"bob".into()).await.unwrap();
        let mut feed = alice.watch(&request);

        lobby.challenges("bob").decline(&request.id).await.unwrap();

        let outcome = alice.next_outcome(&request, &mut feed).await.unwrap();
        assert!(matches!(outcome, ChallengeOutcome::Declined(_)));
        assert_eq!(lobby.presence("alice").await.status, PresenceStatus::Online);
    }

    #[tokio::test]
    async fn test_only_target_can_answer() {
        let lobby = Lobby::new().await;
        let request = lobby.challenges("alice").send(&"bob".into()).await.unwrap();
        let err = lobby.challenges("alice").accept(&request.id).await.unwrap_err();
        assert!(matches!(err, LobbyError::IllegalTransition { .. }));
        let err = lobby.challenges("alice").decline(&request.id).await.unwrap_err();
        assert!(matches!(err, LobbyError::IllegalTransition { .. }));
        let err = lobby.challenges("bob").cancel(&request.id).await.unwrap_err();
        assert!(matches!(err, LobbyError::IllegalTransition { .. }));

        let stored = lobby.ctx.backend.challenges().get(&request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ChallengeStatus::Pending, "Request untouched");
    }

    #[tokio::test]
    async fn test_expired_request_cannot_be_accepted() {
        let lobby = Lobby::new().await;
        let request = lobby.challenges("alice").send(&"bob".into()).await.unwrap();
        lobby.clock.advance(30_000);

        let err = lobby.challenges("bob").accept(&request.id).await.unwrap_err();
        assert!(matches!(err, LobbyError::ChallengeExpired(_)));
        assert!(lobby.ctx.backend.sessions().list().await.unwrap().is_empty());
        assert!(lobby.challenges("bob").incoming().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expire_stale_persists_and_releases() {
        let lobby = Lobby::new().await;
        let request = lobby.challenges("alice").send(&"bob".into()).await.unwrap();
        let sweeper = lobby.challenges("bob");

        assert_eq!(sweeper.expire_stale().await.unwrap(), 0);
        lobby.clock.advance(31_000);
        assert_eq!(sweeper.expire_stale().await.unwrap(), 1);
        assert_eq!(sweeper.expire_stale().await.unwrap(), 0);

        let stored = lobby.ctx.backend.challenges().get(&request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ChallengeStatus::Expired);
        assert_eq!(lobby.presence("alice").await.status, PresenceStatus::Online);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let lobby = Lobby::new().await;
        let alice = lobby.challenges("alice");
        let request = alice.send(&"bob".into()).await.unwrap();

        alice.cancel(&request.id).await.unwrap();
        alice.cancel(&request.id).await.unwrap();

        assert_eq!(alice.check_sent(&request.id).await.unwrap(), Some(ChallengeOutcome::Withdrawn));
        assert_eq!(lobby.presence("alice").await.status, PresenceStatus::Online);
        assert!(lobby.challenges("bob").decline(&request.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_incoming_feed_reports_new_requests() {
        let lobby = Lobby::new().await;
        let bob = lobby.challenges("bob");
        let mut feed = bob.subscribe_incoming();

        let sent = lobby.challenges("alice").send(&"bob".into()).await.unwrap();
        let received = bob.next_incoming(&mut feed).await.unwrap();
        assert_eq!(received.id, sent.id);
        assert_eq!(bob.incoming().await.unwrap(), vec![sent]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_challenge_times_out() {
        let lobby = Lobby::new().await;
        let alice = lobby.challenges("alice");
        let request = alice.send(&"bob".into()).await.unwrap();
        let mut feed = alice.watch(&request);

        let outcome = alice.next_outcome(&request, &mut feed).await.unwrap();
        assert!(matches!(outcome, ChallengeOutcome::Expired(ref r) if r.status == ChallengeStatus::Expired));
        assert!(lobby.challenges("bob").accept(&request.id).await.is_err());
    }

    /// Challenge table where the challenger withdraws just before any answer lands
    #[derive(Default)]
    struct WithdrawnOnAnswer(MemoryTable<ChallengeRequest>);

    impl Table<ChallengeRequest> for WithdrawnOnAnswer {
        async fn insert(&self, row: ChallengeRequest) -> Result<ChallengeRequest> {
            self.0.insert(row).await
        }

        async fn upsert(&self, row: ChallengeRequest) -> Result<ChallengeRequest> {
            self.0.upsert(row).await
        }

        async fn get(&self, key: &str) -> Result<Option<ChallengeRequest>> {
            self.0.get(key).await
        }

        async fn list(&self) -> Result<Vec<ChallengeRequest>> {
            self.0.list().await
        }

        async fn update_if<G, P>(&self, key: &str, guard: G, patch: P) -> Result<ChallengeRequest>
        where
            G: FnOnce(&ChallengeRequest) -> bool + Send,
            P: FnOnce(&mut ChallengeRequest) + Send,
        {
            self.0.delete_if(key, |_| true).await?;
            self.0.update_if(key, guard, patch).await
        }

        async fn delete_if<G>(&self, key: &str, guard: G) -> Result<Option<ChallengeRequest>>
        where
            G: FnOnce(&ChallengeRequest) -> bool + Send,
        {
            self.0.delete_if(key, guard).await
        }

        fn subscribe(&self, filter: Filter<ChallengeRequest>) -> Subscription<ChallengeRequest> {
            self.0.subscribe(filter)
        }
    }

    #[derive(Default)]
    struct RacyBackend {
        sessions: MemoryTable<Session>,
        game_states: MemoryTable<GameStateRow>,
        presence: MemoryTable<PresenceRecord>,
        challenges: WithdrawnOnAnswer,
    }

    impl Backend for RacyBackend {
        type Sessions = MemoryTable<Session>;
        type GameStates = MemoryTable<GameStateRow>;
        type Presence = MemoryTable<PresenceRecord>;
        type Challenges = WithdrawnOnAnswer;

        fn sessions(&self) -> &Self::Sessions {
            &self.sessions
        }

        fn game_states(&self) -> &Self::GameStates {
            &self.game_states
        }

        fn presence(&self) -> &Self::Presence {
            &self.presence
        }

        fn challenges(&self) -> &Self::Challenges {
            &self.challenges
        }
    }

    #[tokio::test]
    async fn test_accept_losing_race_removes_its_room() {
        let ctx = LobbyContext::new(
            Arc::new(RacyBackend::default()),
            Arc::new(ManualClock::new(1_000_000)),
            LobbyConfig::default(),
        );
        for (id, nick) in [("alice", "Alice"), ("bob", "Bob")] {
            Presence::new(ctx.clone(), id.into(), nick)
                .go_online()
                .await
                .unwrap();
        }
        let request = Challenges::new(ctx.clone(), "alice".into())
            .send(&"bob".into())
            .await
            .unwrap();

        let result = Challenges::new(ctx.clone(), "bob".into()).accept(&request.id).await;

        assert!(matches!(result, Err(LobbyError::ChallengeExpired(ref id)) if id == &request.id));
        assert!(ctx.backend.sessions().list().await.unwrap().is_empty(), "No orphan room");
        assert!(ctx.backend.game_states().list().await.unwrap().is_empty(), "No orphan game state");
        let bob = ctx.backend.presence().get("bob").await.unwrap().unwrap();
        assert_eq!(bob.status, PresenceStatus::Online, "Loser never went in game");
    }
}

//! Blind-queue matchmaking.
//!
//! A peer first tries to take over the oldest waiting room created by someone
//! else with a conditional `waiting -> playing` write. Only one joiner can win
//! that write; losers go back to searching. With nothing left to join the peer
//! opens its own room and waits for the change feed to report a joiner.

use game_core::{Score, TableState};
use proto::PlayerId;
use tracing::{debug, info, warn};

use crate::error::{LobbyError, Result};
use crate::fsm::{MatchAction, MatchFsm, MatchState};
use crate::presence;
use crate::records::{generate_room_code, GameStateRow, PresenceStatus, Session, SessionStatus};
use crate::store::{Backend, Change, Filter, Record, Subscription, Table};
use crate::LobbyContext;

/// Room code collisions tolerated before giving up on creating a room
const CREATE_ATTEMPTS: u32 = 8;

/// How a search ended
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// We took a waiting room; the match can start right away
    Joined(Session),
    /// We opened a room and must wait for [`SessionEvent::OpponentJoined`]
    Waiting(Session),
}

impl MatchOutcome {
    pub fn session(&self) -> &Session {
        match self {
            MatchOutcome::Joined(session) | MatchOutcome::Waiting(session) => session,
        }
    }
}

/// Something that happened to the room we are in
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    OpponentJoined(Session),
    /// The room finished or vanished under us
    OpponentLeft(Session),
    /// No room is being watched, or the change feed closed
    Closed,
}

/// One peer's side of matchmaking
pub struct Matchmaker<B: Backend> {
    ctx: LobbyContext<B>,
    me: PlayerId,
    fsm: MatchFsm,
    session: Option<Session>,
    watch: Option<Subscription<Session>>,
}

impl<B: Backend> Matchmaker<B> {
    pub fn new(ctx: LobbyContext<B>, me: PlayerId) -> Self {
        Self {
            ctx,
            me,
            fsm: MatchFsm::new(),
            session: None,
            watch: None,
        }
    }

    pub fn me(&self) -> &PlayerId {
        &self.me
    }

    pub fn state(&self) -> MatchState {
        self.fsm.state()
    }

    /// The room we are in, as last seen
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn apply(&mut self, action: MatchAction) {
        let result = self.fsm.transition(action);
        if result.success {
            debug!(
                player = %self.me,
                from = ?result.from_state,
                to = ?result.to_state,
                ?action,
                "match state"
            );
        } else {
            warn!(player = %self.me, state = ?result.from_state, ?action, "ignored match action");
        }
    }

    fn busy_error(&self) -> LobbyError {
        LobbyError::IllegalTransition {
            table: Session::TABLE,
            key: self
                .session
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_default(),
            reason: format!("cannot search while {:?}", self.fsm.state()),
        }
    }

    /// Join the oldest open room, or open one if none can be taken
    pub async fn find_match(&mut self) -> Result<MatchOutcome> {
        if !self.fsm.can_transition(MatchAction::Search) {
            return Err(self.busy_error());
        }
        self.apply(MatchAction::Search);
        presence::set_status(&self.ctx, &self.me, PresenceStatus::Busy).await?;

        match self.search().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(player = %self.me, error = %e, "search failed");
                self.apply(MatchAction::Cancel);
                presence::release_busy(&self.ctx, &self.me).await?;
                Err(e)
            }
        }
    }

    async fn search(&mut self) -> Result<MatchOutcome> {
        for attempt in 1..=self.ctx.config.max_join_attempts {
            let Some(candidate) = self.oldest_open_room().await? else {
                break;
            };
            match self.try_join(&candidate.id).await {
                Ok(session) => {
                    info!(player = %self.me, room = %session.id, attempt, "joined room");
                    self.watch = Some(
                        self.ctx
                            .backend
                            .sessions()
                            .subscribe(Filter::key(session.id.clone())),
                    );
                    self.session = Some(session.clone());
                    self.apply(MatchAction::Joined);
                    presence::set_status(&self.ctx, &self.me, PresenceStatus::InGame).await?;
                    return Ok(MatchOutcome::Joined(session));
                }
                Err(e) if e.is_conflict() => {
                    debug!(player = %self.me, room = %candidate.id, attempt, "lost join race");
                }
                Err(e) => return Err(e),
            }
        }

        let session = self.create_room().await?;
        self.apply(MatchAction::Created);
        Ok(MatchOutcome::Waiting(session))
    }

    async fn oldest_open_room(&self) -> Result<Option<Session>> {
        Ok(self
            .ctx
            .backend
            .sessions()
            .list()
            .await?
            .into_iter()
            .filter(|s| s.status == SessionStatus::Waiting && s.player1_id != self.me)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))))
    }

    async fn try_join(&self, room_id: &str) -> Result<Session> {
        let me = self.me.clone();
        let now = self.ctx.now();
        self.ctx
            .backend
            .sessions()
            .update_if(
                room_id,
                |s| s.status == SessionStatus::Waiting && s.player2_id.is_none(),
                move |s| {
                    s.status = SessionStatus::Playing;
                    s.player2_id = Some(me);
                    s.updated_at = now;
                },
            )
            .await
    }

    async fn create_room(&mut self) -> Result<Session> {
        let sessions = self.ctx.backend.sessions();
        for _ in 0..CREATE_ATTEMPTS {
            let now = self.ctx.now();
            let session = Session::waiting(generate_room_code(), self.me.clone(), now);
            // Subscribe first so a join right after the insert is not missed
            let watch = sessions.subscribe(Filter::key(session.id.clone()));
            match sessions.insert(session.clone()).await {
                Ok(session) => {
                    if let Err(e) = self
                        .ctx
                        .backend
                        .game_states()
                        .upsert(GameStateRow::initial(session.id.clone(), now))
                        .await
                    {
                        sessions.delete_if(&session.id, |_| true).await?;
                        return Err(e);
                    }
                    info!(player = %self.me, room = %session.id, "created room");
                    self.watch = Some(watch);
                    self.session = Some(session.clone());
                    return Ok(session);
                }
                Err(LobbyError::Conflict { key, .. }) => {
                    debug!(room = %key, "room code taken");
                }
                Err(e) => return Err(e),
            }
        }
        Err(LobbyError::Backend("no free room code".to_string()))
    }

    /// Enter a room created elsewhere, such as by an accepted challenge
    pub async fn adopt(&mut self, session: Session) -> Result<()> {
        if session.slot_of(&self.me).is_none() {
            return Err(LobbyError::PlayerUnavailable(self.me.clone()));
        }
        if !self.fsm.can_transition(MatchAction::Joined) {
            return Err(self.busy_error());
        }
        let watch = self
            .ctx
            .backend
            .sessions()
            .subscribe(Filter::key(session.id.clone()));
        // The room may have moved on before we subscribed
        let current = self.ctx.backend.sessions().get(&session.id).await?;
        self.watch = Some(watch);
        self.session = Some(current.unwrap_or(session));
        self.apply(MatchAction::Joined);
        Ok(())
    }

    /// Wait for the next change that matters to our room
    pub async fn next_event(&mut self) -> Result<SessionEvent> {
        if let Some(session) = &self.session {
            if self.fsm.is_matched() && session.status == SessionStatus::Finished {
                let session = session.clone();
                self.apply(MatchAction::OpponentLeft);
                return Ok(SessionEvent::OpponentLeft(session));
            }
        }

        loop {
            let Some(watch) = self.watch.as_mut() else {
                return Ok(SessionEvent::Closed);
            };
            let Some(change) = watch.next().await else {
                self.watch = None;
                return Ok(SessionEvent::Closed);
            };

            match change {
                Change::Inserted(_) => continue,
                Change::Updated(session) => {
                    let status = session.status;
                    self.session = Some(session.clone());
                    match status {
                        SessionStatus::Playing if self.fsm.state() == MatchState::Waiting => {
                            info!(player = %self.me, room = %session.id, "opponent joined");
                            self.apply(MatchAction::OpponentJoined);
                            presence::set_status(&self.ctx, &self.me, PresenceStatus::InGame).await?;
                            return Ok(SessionEvent::OpponentJoined(session));
                        }
                        SessionStatus::Finished => {
                            info!(player = %self.me, room = %session.id, "opponent left");
                            self.apply(MatchAction::OpponentLeft);
                            return Ok(SessionEvent::OpponentLeft(session));
                        }
                        _ => continue,
                    }
                }
                Change::Deleted(session) => {
                    info!(player = %self.me, room = %session.id, "room closed");
                    self.apply(MatchAction::OpponentLeft);
                    self.watch = None;
                    return Ok(SessionEvent::OpponentLeft(session));
                }
            }
        }
    }

    /// Stop searching or waiting. Does nothing when idle.
    pub async fn cancel_search(&mut self) -> Result<()> {
        match self.fsm.state() {
            MatchState::Idle => Ok(()),
            MatchState::Matched | MatchState::OpponentLeft => self.leave().await,
            MatchState::Searching | MatchState::Waiting => {
                if let Some(session) = self.session.take() {
                    self.close_room(&session.id).await?;
                }
                self.watch = None;
                self.apply(MatchAction::Cancel);
                presence::set_status(&self.ctx, &self.me, PresenceStatus::Online).await?;
                info!(player = %self.me, "search cancelled");
                Ok(())
            }
        }
    }

    /// Leave the current room. Safe to call repeatedly.
    pub async fn leave(&mut self) -> Result<()> {
        self.watch = None;
        if let Some(session) = self.session.take() {
            self.close_room(&session.id).await?;
            info!(player = %self.me, room = %session.id, "left room");
        }
        if self.fsm.state() != MatchState::Idle {
            self.apply(MatchAction::Leave);
        }
        self.fsm.reset();
        presence::set_status(&self.ctx, &self.me, PresenceStatus::Online).await
    }

    /// Delete a waiting room, or finish it if someone got in first
    async fn close_room(&self, room_id: &str) -> Result<()> {
        let sessions = self.ctx.backend.sessions();
        match sessions
            .delete_if(room_id, |s| s.status == SessionStatus::Waiting)
            .await
        {
            Ok(Some(_)) => {
                self.ctx.backend.game_states().delete_if(room_id, |_| true).await?;
                debug!(room = %room_id, "deleted waiting room");
                return Ok(());
            }
            Ok(None) => return Ok(()),
            Err(e) if e.is_conflict() => {}
            Err(e) => return Err(e),
        }

        let now = self.ctx.now();
        match sessions
            .update_if(
                room_id,
                |s| s.status == SessionStatus::Playing,
                |s| {
                    s.status = SessionStatus::Finished;
                    s.updated_at = now;
                },
            )
            .await
        {
            Ok(_) => {
                debug!(room = %room_id, "finished room");
                Ok(())
            }
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn authority_session(&self) -> Result<&Session> {
        let session = self.session.as_ref().ok_or_else(|| LobbyError::NotFound {
            table: Session::TABLE,
            key: String::new(),
        })?;
        if session.player1_id != self.me {
            return Err(LobbyError::IllegalTransition {
                table: Session::TABLE,
                key: session.id.clone(),
                reason: "only player1 writes match state".to_string(),
            });
        }
        Ok(session)
    }

    /// Persist the score to the room row
    pub async fn record_score(&mut self, score: &Score) -> Result<Session> {
        let room_id = self.authority_session()?.id.clone();
        let now = self.ctx.now();
        let (p1, p2) = (score.player1, score.player2);
        let session = self
            .ctx
            .backend
            .sessions()
            .update_if(
                &room_id,
                |s| s.status == SessionStatus::Playing,
                |s| {
                    s.player1_score = p1;
                    s.player2_score = p2;
                    s.updated_at = now;
                },
            )
            .await?;
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Mirror the table into the room's game state row
    pub async fn save_game_state(&self, table: &TableState) -> Result<()> {
        let room_id = self.authority_session()?.id.clone();
        let row = GameStateRow::from_table(room_id, table, self.ctx.now());
        self.ctx.backend.game_states().upsert(row).await?;
        Ok(())
    }
}

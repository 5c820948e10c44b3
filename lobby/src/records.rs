//! Rows shared through the storage service.
//!
//! Field names follow the hosted schema (`snake_case` columns), so the serde
//! representation of each record is exactly one table row.

use game_core::{Config, PlayerSlot, TableState};
use proto::PlayerId;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::store::Record;

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Playing,
    Finished,
}

impl SessionStatus {
    /// `waiting -> playing -> finished`. Abandoned waiting rooms are deleted
    /// instead of finished.
    pub fn can_become(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Waiting, Waiting)
                | (Waiting, Playing)
                | (Playing, Playing)
                | (Playing, Finished)
        )
    }
}

/// A room binding two identities to one match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub player1_id: PlayerId,
    pub player2_id: Option<PlayerId>,
    pub status: SessionStatus,
    pub player1_score: u32,
    pub player2_score: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Session {
    /// Room created by `player1` and waiting for an opponent
    pub fn waiting(id: String, player1_id: PlayerId, now: u64) -> Self {
        Self {
            id,
            player1_id,
            player2_id: None,
            status: SessionStatus::Waiting,
            player1_score: 0,
            player2_score: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Room created already full, as when a challenge is accepted
    pub fn playing(id: String, player1_id: PlayerId, player2_id: PlayerId, now: u64) -> Self {
        Self {
            player2_id: Some(player2_id),
            status: SessionStatus::Playing,
            ..Self::waiting(id, player1_id, now)
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Playing && self.player2_id.is_some()
    }

    pub fn slot_of(&self, player: &PlayerId) -> Option<PlayerSlot> {
        if &self.player1_id == player {
            Some(PlayerSlot::Player1)
        } else if self.player2_id.as_ref() == Some(player) {
            Some(PlayerSlot::Player2)
        } else {
            None
        }
    }

    pub fn participant(&self, slot: PlayerSlot) -> Option<&PlayerId> {
        match slot {
            PlayerSlot::Player1 => Some(&self.player1_id),
            PlayerSlot::Player2 => self.player2_id.as_ref(),
        }
    }

    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        self.slot_of(player)
            .and_then(|slot| self.participant(slot.opponent()))
    }
}

impl Record for Session {
    const TABLE: &'static str = "sessions";

    fn key(&self) -> &str {
        &self.id
    }

    fn check_update(old: &Self, new: &Self) -> Result<(), String> {
        if old.status == SessionStatus::Finished {
            return Err("finished sessions are terminal".to_string());
        }
        if !old.status.can_become(new.status) {
            return Err(format!("{:?} cannot become {:?}", old.status, new.status));
        }
        if old.player1_id != new.player1_id {
            return Err("player1 cannot change".to_string());
        }
        if new.status == SessionStatus::Waiting && new.player2_id.is_some() {
            return Err("a waiting session has no player2".to_string());
        }
        if new.status != SessionStatus::Waiting && new.player2_id.is_none() {
            return Err(format!("a {:?} session needs player2", new.status));
        }
        if new.player1_score < old.player1_score || new.player2_score < old.player2_score {
            return Err("scores never decrease".to_string());
        }
        Ok(())
    }
}

/// Generate a random 5-character room code (A-Z, 0-9)
pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..5)
        .map(|_| {
            let idx = rng.gen_range(0..CHARS.len());
            CHARS[idx] as char
        })
        .collect()
}

// ============================================================================
// Game state mirror
// ============================================================================

/// Persisted snapshot of the table, keyed by room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateRow {
    pub room_id: String,
    pub puck_x: f32,
    pub puck_y: f32,
    pub puck_vx: f32,
    pub puck_vy: f32,
    pub player1_x: f32,
    pub player1_y: f32,
    pub player2_x: f32,
    pub player2_y: f32,
    pub last_update: u64,
}

impl GameStateRow {
    /// Row for a fresh table
    pub fn initial(room_id: String, now: u64) -> Self {
        Self::from_table(room_id, &TableState::new(&Config::new()), now)
    }

    pub fn from_table(room_id: String, table: &TableState, now: u64) -> Self {
        Self {
            room_id,
            puck_x: table.puck.pos.x,
            puck_y: table.puck.pos.y,
            puck_vx: table.puck.vel.x,
            puck_vy: table.puck.vel.y,
            player1_x: table.paddles.player1.pos.x,
            player1_y: table.paddles.player1.pos.y,
            player2_x: table.paddles.player2.pos.x,
            player2_y: table.paddles.player2.pos.y,
            last_update: now,
        }
    }
}

impl Record for GameStateRow {
    const TABLE: &'static str = "game_state";

    fn key(&self) -> &str {
        &self.room_id
    }
}

// ============================================================================
// Presence
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Busy,
    InGame,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub device_id: PlayerId,
    pub nickname: String,
    pub status: PresenceStatus,
    pub last_seen: u64,
}

impl PresenceRecord {
    /// Fresh iff `now - last_seen < ttl`; stale records count as absent
    pub fn is_fresh(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.last_seen) < ttl_ms
    }

    /// Fresh and free to be challenged
    pub fn is_available(&self, now: u64, ttl_ms: u64) -> bool {
        self.is_fresh(now, ttl_ms) && self.status == PresenceStatus::Online
    }
}

impl Record for PresenceRecord {
    const TABLE: &'static str = "presence";

    fn key(&self) -> &str {
        self.device_id.as_str()
    }
}

// ============================================================================
// Challenges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl ChallengeStatus {
    pub fn is_terminal(self) -> bool {
        self != ChallengeStatus::Pending
    }
}

/// A directed, time-bounded invitation to play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub id: String,
    pub challenger_id: PlayerId,
    pub challenger_nickname: String,
    pub challenged_id: PlayerId,
    pub challenged_nickname: String,
    pub status: ChallengeStatus,
    pub room_id: Option<String>,
    pub created_at: u64,
    pub expires_at: u64,
}

impl ChallengeRequest {
    pub fn new(challenger: &PresenceRecord, challenged: &PresenceRecord, now: u64, ttl_ms: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            challenger_id: challenger.device_id.clone(),
            challenger_nickname: challenger.nickname.clone(),
            challenged_id: challenged.device_id.clone(),
            challenged_nickname: challenged.nickname.clone(),
            status: ChallengeStatus::Pending,
            room_id: None,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    /// Status as consumers must see it: a pending request past its deadline
    /// is expired whether or not anyone has written that down yet.
    pub fn effective_status(&self, now: u64) -> ChallengeStatus {
        if self.status == ChallengeStatus::Pending && now >= self.expires_at {
            ChallengeStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_actionable(&self, now: u64) -> bool {
        self.effective_status(now) == ChallengeStatus::Pending
    }
}

impl Record for ChallengeRequest {
    const TABLE: &'static str = "challenges";

    fn key(&self) -> &str {
        &self.id
    }

    fn check_update(old: &Self, new: &Self) -> Result<(), String> {
        if old.status.is_terminal() {
            return Err(format!("challenge is already {:?}", old.status));
        }
        if new.status == ChallengeStatus::Accepted && new.room_id.is_none() {
            return Err("an accepted challenge names its room".to_string());
        }
        Ok(())
    }
}

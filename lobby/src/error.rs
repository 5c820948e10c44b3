//! Error types for lobby operations.

use proto::PlayerId;
use thiserror::Error;

/// Result type alias using [`LobbyError`].
pub type Result<T> = std::result::Result<T, LobbyError>;

#[derive(Debug, Error)]
pub enum LobbyError {
    /// The row does not exist (never created, or already deleted)
    #[error("{table} row {key} not found")]
    NotFound { table: &'static str, key: String },

    /// A conditional write lost against a concurrent writer
    #[error("{table} row {key} was changed by another writer")]
    Conflict { table: &'static str, key: String },

    /// The write would move a row backward or out of a terminal state
    #[error("illegal transition on {table} row {key}: {reason}")]
    IllegalTransition {
        table: &'static str,
        key: String,
        reason: String,
    },

    #[error("challenge {0} has expired")]
    ChallengeExpired(String),

    /// Target is offline, stale, or already busy
    #[error("player {0} is not available")]
    PlayerUnavailable(PlayerId),

    /// Storage or notification service failure
    #[error("backend error: {0}")]
    Backend(String),
}

impl LobbyError {
    /// Whether this error means another peer won a race
    pub fn is_conflict(&self) -> bool {
        matches!(self, LobbyError::Conflict { .. } | LobbyError::NotFound { .. })
    }
}

//! Sync channel protocol for air hockey
//!
//! Every in-match message is a last-write-wins state replacement. Messages are
//! carried in an [`Envelope`] stamped with the sending participant and encoded
//! with postcard for compact binary frames.

use std::fmt;

use postcard::{from_bytes, to_allocvec};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identity
// ============================================================================

/// Opaque device-scoped player identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Broadcast topic name for a session
pub fn topic_for(session_id: &str) -> String {
    format!("game_{session_id}")
}

// ============================================================================
// Messages
// ============================================================================

/// Cue replayed by the peer that did not run the physics step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundKind {
    Wall,
    Paddle,
    Goal,
}

impl SoundKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SoundKind::Wall => "wall",
            SoundKind::Paddle => "paddle",
            SoundKind::Goal => "goal",
        }
    }
}

/// Message kinds, used as broadcast event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    PaddleMove,
    PuckUpdate,
    ScoreUpdate,
    Sound,
}

impl MessageKind {
    pub fn event_name(self) -> &'static str {
        match self {
            MessageKind::PaddleMove => "paddle_move",
            MessageKind::PuckUpdate => "puck_update",
            MessageKind::ScoreUpdate => "score_update",
            MessageKind::Sound => "sound",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Either peer, for its own paddle
    PaddleMove { x: f32, y: f32, player_id: PlayerId },

    /// Authoritative peer only
    PuckUpdate { x: f32, y: f32, vx: f32, vy: f32 },

    /// Authoritative peer only
    ScoreUpdate { player1: u32, player2: u32 },

    /// Whichever peer's physics step produced the event
    Sound { kind: SoundKind },
}

impl SyncMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            SyncMessage::PaddleMove { .. } => MessageKind::PaddleMove,
            SyncMessage::PuckUpdate { .. } => MessageKind::PuckUpdate,
            SyncMessage::ScoreUpdate { .. } => MessageKind::ScoreUpdate,
            SyncMessage::Sound { .. } => MessageKind::Sound,
        }
    }

    /// Whether this message changes puck-side state only the authority may write
    pub fn is_authoritative(&self) -> bool {
        matches!(
            self,
            SyncMessage::PuckUpdate { .. } | SyncMessage::ScoreUpdate { .. }
        )
    }

    /// Reject payloads carrying NaN or infinite coordinates
    pub fn is_finite(&self) -> bool {
        match self {
            SyncMessage::PaddleMove { x, y, .. } => x.is_finite() && y.is_finite(),
            SyncMessage::PuckUpdate { x, y, vx, vy } => {
                x.is_finite() && y.is_finite() && vx.is_finite() && vy.is_finite()
            }
            SyncMessage::ScoreUpdate { .. } | SyncMessage::Sound { .. } => true,
        }
    }
}

/// A message stamped with the participant that published it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: PlayerId,
    pub message: SyncMessage,
}

// ============================================================================
// Serialization Helpers
// ============================================================================

impl Envelope {
    pub fn new(from: PlayerId, message: SyncMessage) -> Self {
        Self { from, message }
    }

    /// Serialize envelope to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        to_allocvec(self)
    }

    /// Deserialize envelope from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialization() {
        let msg = Envelope::new(
            PlayerId::new("device-a"),
            SyncMessage::PaddleMove {
                x: 120.0,
                y: 80.5,
                player_id: PlayerId::new("device-a"),
            },
        );
        let bytes = msg.to_bytes().expect("Serialization should succeed");
        let decoded = Envelope::from_bytes(&bytes).expect("Deserialization should succeed");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let msg = Envelope::new(
            PlayerId::new("host"),
            SyncMessage::PuckUpdate {
                x: 200.0,
                y: 350.0,
                vx: 1.5,
                vy: -2.0,
            },
        );
        let bytes = msg.to_bytes().expect("Serialization should succeed");
        assert!(Envelope::from_bytes(&bytes[..bytes.len() - 2]).is_err());
    }

    #[test]
    fn test_event_names() {
        let score = SyncMessage::ScoreUpdate {
            player1: 2,
            player2: 1,
        };
        assert_eq!(score.kind().event_name(), "score_update");
        assert_eq!(
            SyncMessage::Sound {
                kind: SoundKind::Goal
            }
            .kind()
            .event_name(),
            "sound"
        );
        assert_eq!(SoundKind::Paddle.as_str(), "paddle");
        assert_eq!(topic_for("AB12C"), "game_AB12C");
    }

    #[test]
    fn test_authority_only_kinds() {
        assert!(SyncMessage::ScoreUpdate {
            player1: 0,
            player2: 0
        }
        .is_authoritative());
        assert!(!SyncMessage::Sound {
            kind: SoundKind::Wall
        }
        .is_authoritative());
    }

    #[test]
    fn test_non_finite_payload_detected() {
        let bad = SyncMessage::PuckUpdate {
            x: f32::NAN,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
        };
        assert!(!bad.is_finite());
        let bad = SyncMessage::PaddleMove {
            x: 0.0,
            y: f32::INFINITY,
            player_id: PlayerId::new("p"),
        };
        assert!(!bad.is_finite());
    }
}

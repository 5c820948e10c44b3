use std::fmt;

use lobby::{ChallengeOutcome, PresenceRecord, SessionEvent};

/// Plain messages shown to the player instead of errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    OpponentLeft,
    ChallengeDeclined { by: String },
    ChallengeExpired,
}

impl Notice {
    pub fn from_session_event(event: &SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::OpponentLeft(_) | SessionEvent::Closed => Some(Notice::OpponentLeft),
            SessionEvent::OpponentJoined(_) => None,
        }
    }

    pub fn from_challenge(outcome: &ChallengeOutcome) -> Option<Self> {
        match outcome {
            ChallengeOutcome::Declined(request) => Some(Notice::ChallengeDeclined {
                by: request.challenged_nickname.clone(),
            }),
            ChallengeOutcome::Expired(_) => Some(Notice::ChallengeExpired),
            ChallengeOutcome::Accepted(_) | ChallengeOutcome::Withdrawn => None,
        }
    }

    /// A silent opponent counts as gone. Pass the result of a freshness lookup.
    pub fn from_opponent_presence(record: Option<&PresenceRecord>) -> Option<Self> {
        match record {
            Some(_) => None,
            None => Some(Notice::OpponentLeft),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::OpponentLeft => write!(f, "Your opponent left the game."),
            Notice::ChallengeDeclined { by } => write!(f, "{by} declined your challenge."),
            Notice::ChallengeExpired => write!(f, "Your challenge expired."),
        }
    }
}

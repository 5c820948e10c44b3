//! Matchmaking State Machine
//!
//! Tracks one peer's progress from idle to a matched session, for both the
//! blind queue and accepted challenges.

/// Matchmaking states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Idle,
    /// Looking for a waiting room to join
    Searching,
    /// Created a room, waiting for someone to join it
    Waiting,
    Matched,
    /// The opponent left or the room closed under us
    OpponentLeft,
}

/// Actions that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchAction {
    Search,
    /// Joined a room (queue) or entered one through a challenge
    Joined,
    Created,
    OpponentJoined,
    OpponentLeft,
    Cancel,
    Leave,
}

/// Result of a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionResult {
    pub success: bool,
    pub from_state: MatchState,
    pub to_state: MatchState,
    pub action: MatchAction,
}

/// Matchmaking Finite State Machine
#[derive(Debug)]
pub struct MatchFsm {
    state: MatchState,
}

impl MatchFsm {
    pub fn new() -> Self {
        Self {
            state: MatchState::Idle,
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn can_transition(&self, action: MatchAction) -> bool {
        self.next_state(action).is_some()
    }

    /// Attempt a transition
    pub fn transition(&mut self, action: MatchAction) -> TransitionResult {
        let from_state = self.state;

        if let Some(next_state) = self.next_state(action) {
            self.state = next_state;
            TransitionResult {
                success: true,
                from_state,
                to_state: next_state,
                action,
            }
        } else {
            TransitionResult {
                success: false,
                from_state,
                to_state: from_state,
                action,
            }
        }
    }

    fn next_state(&self, action: MatchAction) -> Option<MatchState> {
        match (self.state, action) {
            // From Idle
            (MatchState::Idle, MatchAction::Search) => Some(MatchState::Searching),
            (MatchState::Idle, MatchAction::Joined) => Some(MatchState::Matched),
            (MatchState::Idle, MatchAction::Cancel) => Some(MatchState::Idle),
            (MatchState::Idle, MatchAction::Leave) => Some(MatchState::Idle),

            // From Searching
            (MatchState::Searching, MatchAction::Joined) => Some(MatchState::Matched),
            (MatchState::Searching, MatchAction::Created) => Some(MatchState::Waiting),
            (MatchState::Searching, MatchAction::Cancel) => Some(MatchState::Idle),

            // From Waiting
            (MatchState::Waiting, MatchAction::OpponentJoined) => Some(MatchState::Matched),
            (MatchState::Waiting, MatchAction::OpponentLeft) => Some(MatchState::OpponentLeft),
            (MatchState::Waiting, MatchAction::Cancel) => Some(MatchState::Idle),
            (MatchState::Waiting, MatchAction::Leave) => Some(MatchState::Idle),

            // From Matched
            (MatchState::Matched, MatchAction::OpponentLeft) => Some(MatchState::OpponentLeft),
            (MatchState::Matched, MatchAction::Leave) => Some(MatchState::Idle),

            // From OpponentLeft
            (MatchState::OpponentLeft, MatchAction::Leave) => Some(MatchState::Idle),
            (MatchState::OpponentLeft, MatchAction::Cancel) => Some(MatchState::Idle),

            // Invalid transition
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = MatchState::Idle;
    }

    pub fn is_matched(&self) -> bool {
        self.state == MatchState::Matched
    }

    /// Searching or holding an open room
    pub fn is_pending(&self) -> bool {
        matches!(self.state, MatchState::Searching | MatchState::Waiting)
    }
}

impl Default for MatchFsm {
    fn default() -> Self {
        Self::new()
    }
}

//! One peer's view of the table during a match

use game_core::{Config, Paddle, PlayerSlot, Puck, Score, TableState};
use glam::Vec2;

use crate::authority::Seat;

/// Local copy of the table plus who we are in it.
///
/// The authority's copy is the real one; the follower's copy is whatever it
/// last heard, applied raw without interpolation.
#[derive(Debug, Clone)]
pub struct MatchView {
    seat: Seat,
    table: TableState,
    // Frames since the authority's puck last reached us
    frames_since_puck_update: u32,
}

impl MatchView {
    pub fn new(seat: Seat, config: &Config) -> Self {
        Self {
            seat,
            table: TableState::new(config),
            frames_since_puck_update: 0,
        }
    }

    pub fn seat(&self) -> &Seat {
        &self.seat
    }

    pub fn table(&self) -> &TableState {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TableState {
        &mut self.table
    }

    pub fn my_paddle(&self) -> &Paddle {
        self.table.paddles.get(self.seat.slot)
    }

    pub fn opponent_paddle(&self) -> &Paddle {
        self.table.paddles.get(self.seat.slot.opponent())
    }

    /// Last write wins
    pub fn set_opponent_paddle(&mut self, pos: Vec2) {
        self.table.paddles.get_mut(self.seat.slot.opponent()).pos = pos;
    }

    pub fn set_puck(&mut self, puck: Puck) {
        self.table.puck = puck;
        self.frames_since_puck_update = 0;
    }

    /// Take the authority's score without ever moving backward.
    /// Returns the side that gained a point, if one did.
    pub fn merge_score(&mut self, remote: Score) -> Option<PlayerSlot> {
        let before = self.table.score;
        let score = &mut self.table.score;
        score.player1 = score.player1.max(remote.player1);
        score.player2 = score.player2.max(remote.player2);
        if score.player1 > before.player1 {
            Some(PlayerSlot::Player1)
        } else if score.player2 > before.player2 {
            Some(PlayerSlot::Player2)
        } else {
            None
        }
    }

    pub fn end_frame(&mut self) {
        self.frames_since_puck_update = self.frames_since_puck_update.saturating_add(1);
    }

    pub fn frames_since_puck_update(&self) -> u32 {
        self.frames_since_puck_update
    }
}

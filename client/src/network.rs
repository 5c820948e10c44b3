//! Sync message handling

use game_core::{GameEvent, PlayerSlot, Puck, Score};
use glam::Vec2;
use proto::{Envelope, PlayerId, SoundKind, SyncMessage};
use tracing::{debug, trace};

use crate::state::MatchView;

/// What an incoming message did to the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Applied,
    Ignored,
    /// A sound the authority heard; replay it locally
    Cue(SoundKind),
    /// The score moved in this side's favour
    Goal(PlayerSlot),
}

/// Apply one received message to the local view
pub fn handle_message(envelope: Envelope, view: &mut MatchView) -> Handled {
    let Envelope { from, message } = envelope;
    if from != view.seat().opponent {
        debug!(from = %from, "message from non-participant");
        return Handled::Ignored;
    }
    if !message.is_finite() {
        debug!(kind = ?message.kind(), "non-finite payload");
        return Handled::Ignored;
    }
    if message.is_authoritative() && view.seat().is_authority() {
        debug!(kind = ?message.kind(), "authority ignores remote puck state");
        return Handled::Ignored;
    }

    match message {
        SyncMessage::PaddleMove { x, y, player_id } => {
            if player_id != view.seat().opponent {
                trace!(player = %player_id, "paddle move for a paddle we own");
                return Handled::Ignored;
            }
            view.set_opponent_paddle(Vec2::new(x, y));
            Handled::Applied
        }
        SyncMessage::PuckUpdate { x, y, vx, vy } => {
            view.set_puck(Puck::new(Vec2::new(x, y), Vec2::new(vx, vy)));
            Handled::Applied
        }
        SyncMessage::ScoreUpdate { player1, player2 } => {
            match view.merge_score(Score { player1, player2 }) {
                Some(slot) => Handled::Goal(slot),
                None => Handled::Applied,
            }
        }
        SyncMessage::Sound { kind } => Handled::Cue(kind),
    }
}

/// Create a paddle move message for our own paddle
pub fn paddle_move(me: &PlayerId, pos: Vec2) -> SyncMessage {
    SyncMessage::PaddleMove {
        x: pos.x,
        y: pos.y,
        player_id: me.clone(),
    }
}

/// Create a puck update message
pub fn puck_update(puck: &Puck) -> SyncMessage {
    SyncMessage::PuckUpdate {
        x: puck.pos.x,
        y: puck.pos.y,
        vx: puck.vel.x,
        vy: puck.vel.y,
    }
}

/// Create a score update message
pub fn score_update(score: &Score) -> SyncMessage {
    SyncMessage::ScoreUpdate {
        player1: score.player1,
        player2: score.player2,
    }
}

pub fn sound_for(event: &GameEvent) -> SoundKind {
    match event {
        GameEvent::WallHit => SoundKind::Wall,
        GameEvent::PaddleHit(_) => SoundKind::Paddle,
        GameEvent::Goal { .. } => SoundKind::Goal,
    }
}

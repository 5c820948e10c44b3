//! Who simulates the table.
//!
//! player1 (the room creator, or the challenger) is the authority for the
//! whole session. The other participant only mirrors what it receives.

use game_core::PlayerSlot;
use lobby::Session;
use proto::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Runs the physics step and publishes puck, score and sound
    Authority,
    /// Applies whatever the authority publishes
    Follower,
}

impl Role {
    pub fn for_slot(slot: PlayerSlot) -> Self {
        match slot {
            PlayerSlot::Player1 => Role::Authority,
            PlayerSlot::Player2 => Role::Follower,
        }
    }

    pub fn is_authority(self) -> bool {
        self == Role::Authority
    }
}

/// Our place in a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub me: PlayerId,
    pub slot: PlayerSlot,
    pub role: Role,
    pub opponent: PlayerId,
}

impl Seat {
    /// `None` unless `me` is one of two seated participants
    pub fn resolve(session: &Session, me: &PlayerId) -> Option<Self> {
        let slot = session.slot_of(me)?;
        let opponent = session.participant(slot.opponent())?.clone();
        Some(Self {
            me: me.clone(),
            slot,
            role: Role::for_slot(slot),
            opponent,
        })
    }

    pub fn is_authority(&self) -> bool {
        self.role.is_authority()
    }
}

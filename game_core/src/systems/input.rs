use glam::Vec2;

use crate::{Config, Paddles, PlayerSlot};

/// Move a player's paddle to the pointer position, kept inside its half.
///
/// Non-finite pointer coordinates are ignored and the paddle stays put.
pub fn apply_paddle_input(paddles: &mut Paddles, slot: PlayerSlot, target: Vec2, config: &Config) {
    if !target.is_finite() {
        return;
    }
    paddles.get_mut(slot).pos = config.clamp_paddle(slot, target);
}

use glam::Vec2;

use crate::{Config, Events, GameEvent, Paddle, Paddles, Puck};

/// Bounce the puck off the left and right rails
pub fn check_walls(puck: &mut Puck, config: &Config, events: &mut Events) {
    let r = config.puck_radius;

    if puck.pos.x - r < 0.0 {
        puck.pos.x = r;
        puck.vel.x = -puck.vel.x;
        events.push(GameEvent::WallHit);
    }
    if puck.pos.x + r > config.table_width {
        puck.pos.x = config.table_width - r;
        puck.vel.x = -puck.vel.x;
        events.push(GameEvent::WallHit);
    }
}

/// Resolve puck contact with both paddles, player 1 first
pub fn check_paddles(puck: &mut Puck, paddles: &Paddles, config: &Config, events: &mut Events) {
    for paddle in paddles.in_order() {
        if deflect(puck, paddle, config) {
            events.push(GameEvent::PaddleHit(paddle.slot));
        }
    }
}

/// Deflect the puck away from a single paddle. Returns true on contact.
fn deflect(puck: &mut Puck, paddle: &Paddle, config: &Config) -> bool {
    let reach = config.puck_radius + config.paddle_radius;
    let delta = puck.pos - paddle.pos;
    let dist = delta.length();

    if !(dist < reach) {
        return false;
    }

    // Coincident centers have no direction; push straight up
    let normal = delta.try_normalize().unwrap_or(Vec2::NEG_Y);

    let speed = puck.speed() + config.paddle_impulse;
    puck.vel = normal * speed;
    puck.pos += normal * (reach - dist);
    true
}

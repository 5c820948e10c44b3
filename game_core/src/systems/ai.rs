use crate::{Config, Paddle, Puck};

/// Practice-mode opponent: ease toward the puck while it is in our half,
/// otherwise drift back to the home line. Always tracks the puck's x.
pub fn drive_ai_paddle(paddle: &mut Paddle, puck: &Puck, config: &Config) {
    let follow = config.ai_follow;
    let mut pos = paddle.pos;

    pos.x += (puck.pos.x - pos.x) * follow;
    let target_y = if config.in_half(paddle.slot, puck.pos.y) {
        puck.pos.y
    } else {
        config.home_y(paddle.slot)
    };
    pos.y += (target_y - pos.y) * follow;

    if pos.is_finite() {
        paddle.pos = config.clamp_paddle(paddle.slot, pos);
    }
}

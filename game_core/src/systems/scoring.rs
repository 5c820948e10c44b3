use crate::{Config, Events, GameEvent, PlayerSlot, Puck, Score};

/// Check the end lines: a goal inside the mouth, a rail bounce outside it.
///
/// The top goal (y = 0) is defended by player 1, the bottom goal by player 2.
pub fn check_goals(puck: &mut Puck, score: &mut Score, config: &Config, events: &mut Events) {
    let r = config.puck_radius;

    if puck.pos.y - r < 0.0 {
        if config.in_goal_mouth(puck.pos.x) {
            goal(puck, score, config, events, PlayerSlot::Player2);
        } else {
            puck.pos.y = r;
            puck.vel.y = -puck.vel.y;
            events.push(GameEvent::WallHit);
        }
    }

    if puck.pos.y + r > config.table_height {
        if config.in_goal_mouth(puck.pos.x) {
            goal(puck, score, config, events, PlayerSlot::Player1);
        } else {
            puck.pos.y = config.table_height - r;
            puck.vel.y = -puck.vel.y;
            events.push(GameEvent::WallHit);
        }
    }
}

fn goal(puck: &mut Puck, score: &mut Score, config: &Config, events: &mut Events, scorer: PlayerSlot) {
    score.increment(scorer);
    events.push(GameEvent::Goal { scorer });
    puck.reset(config.center());
}

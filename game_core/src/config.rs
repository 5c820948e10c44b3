use glam::Vec2;

use crate::{Params, PlayerSlot};

/// Game configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub table_width: f32,
    pub table_height: f32,
    pub goal_width: f32,
    pub puck_radius: f32,
    pub puck_friction: f32,
    pub paddle_radius: f32,
    pub paddle_impulse: f32,
    pub paddle_home_offset: f32,
    pub ai_follow: f32,
    pub win_score: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_width: Params::TABLE_WIDTH,
            table_height: Params::TABLE_HEIGHT,
            goal_width: Params::GOAL_WIDTH,
            puck_radius: Params::PUCK_RADIUS,
            puck_friction: Params::PUCK_FRICTION,
            paddle_radius: Params::PADDLE_RADIUS,
            paddle_impulse: Params::PADDLE_IMPULSE,
            paddle_home_offset: Params::PADDLE_HOME_OFFSET,
            ai_follow: Params::AI_FOLLOW,
            win_score: Params::WIN_SCORE,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Center spot, where the puck is dropped after a goal
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.table_width / 2.0, self.table_height / 2.0)
    }

    /// Left and right x bounds of both goal mouths
    pub fn goal_mouth(&self) -> (f32, f32) {
        (
            (self.table_width - self.goal_width) / 2.0,
            (self.table_width + self.goal_width) / 2.0,
        )
    }

    pub fn in_goal_mouth(&self, x: f32) -> bool {
        let (left, right) = self.goal_mouth();
        x > left && x < right
    }

    /// Y coordinate of the home line for a player
    pub fn home_y(&self, slot: PlayerSlot) -> f32 {
        match slot {
            PlayerSlot::Player1 => self.paddle_home_offset,
            PlayerSlot::Player2 => self.table_height - self.paddle_home_offset,
        }
    }

    /// Starting paddle position for a player
    pub fn paddle_home(&self, slot: PlayerSlot) -> Vec2 {
        Vec2::new(self.table_width / 2.0, self.home_y(slot))
    }

    /// Allowed (min, max) paddle center position inside a player's half
    pub fn paddle_bounds(&self, slot: PlayerSlot) -> (Vec2, Vec2) {
        let r = self.paddle_radius;
        let mid = self.table_height / 2.0;
        let (min_y, max_y) = match slot {
            PlayerSlot::Player1 => (r, mid - r),
            PlayerSlot::Player2 => (mid + r, self.table_height - r),
        };
        (
            Vec2::new(r, min_y),
            Vec2::new(self.table_width - r, max_y),
        )
    }

    /// Clamp a paddle position to the owner's half of the table
    pub fn clamp_paddle(&self, slot: PlayerSlot, pos: Vec2) -> Vec2 {
        let (min, max) = self.paddle_bounds(slot);
        pos.clamp(min, max)
    }

    /// Whether a point lies in the given player's half
    pub fn in_half(&self, slot: PlayerSlot, y: f32) -> bool {
        let mid = self.table_height / 2.0;
        match slot {
            PlayerSlot::Player1 => y < mid,
            PlayerSlot::Player2 => y > mid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_goal_mouth_centered() {
        let config = Config::new();
        assert_eq!(config.goal_mouth(), (140.0, 260.0));
        assert!(config.in_goal_mouth(200.0));
        assert!(!config.in_goal_mouth(140.0), "Mouth edges are exclusive");
        assert!(!config.in_goal_mouth(30.0));
    }

    #[test]
    fn test_config_paddle_home() {
        let config = Config::new();
        assert_eq!(config.paddle_home(PlayerSlot::Player1), Vec2::new(200.0, 100.0));
        assert_eq!(config.paddle_home(PlayerSlot::Player2), Vec2::new(200.0, 600.0));
    }

    #[test]
    fn test_config_clamp_paddle_to_own_half() {
        let config = Config::new();
        let r = config.paddle_radius;

        let clamped = config.clamp_paddle(PlayerSlot::Player1, Vec2::new(-50.0, 500.0));
        assert_eq!(clamped, Vec2::new(r, config.table_height / 2.0 - r));

        let clamped = config.clamp_paddle(PlayerSlot::Player2, Vec2::new(900.0, 0.0));
        assert_eq!(
            clamped,
            Vec2::new(config.table_width - r, config.table_height / 2.0 + r)
        );

        let valid = Vec2::new(120.0, 550.0);
        assert_eq!(config.clamp_paddle(PlayerSlot::Player2, valid), valid);
    }
}

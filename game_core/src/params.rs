/// Game tuning parameters for air hockey
#[derive(Debug, Clone, Copy)]
pub struct Params;

impl Params {
    // Table
    pub const TABLE_WIDTH: f32 = 400.0;
    pub const TABLE_HEIGHT: f32 = 700.0;
    pub const GOAL_WIDTH: f32 = 120.0;

    // Puck
    pub const PUCK_RADIUS: f32 = 15.0;
    pub const PUCK_FRICTION: f32 = 0.99; // Velocity multiplier per step

    // Paddle
    pub const PADDLE_RADIUS: f32 = 25.0;
    pub const PADDLE_IMPULSE: f32 = 7.5; // Speed added on every paddle hit
    pub const PADDLE_HOME_OFFSET: f32 = 100.0; // Distance of home line from own goal

    // Practice opponent
    pub const AI_FOLLOW: f32 = 0.05; // Fraction of the gap closed per step

    // Score
    pub const WIN_SCORE: u32 = 7;

    // Timing
    pub const STEPS_PER_SECOND: u32 = 60;
}

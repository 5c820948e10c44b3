pub mod components;
pub mod config;
pub mod params;
pub mod resources;
pub mod systems;

pub use components::*;
pub use config::*;
pub use params::*;
pub use resources::*;

use systems::*;

/// Everything the physics step reads and writes
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    pub puck: Puck,
    pub paddles: Paddles,
    pub score: Score,
    pub tick: u64,
}

impl TableState {
    /// Fresh table: puck resting on the center spot, paddles on their home lines
    pub fn new(config: &Config) -> Self {
        Self {
            puck: Puck::at_rest(config.center()),
            paddles: Paddles::new(
                config.paddle_home(PlayerSlot::Player1),
                config.paddle_home(PlayerSlot::Player2),
            ),
            score: Score::new(),
            tick: 0,
        }
    }
}

/// Run one fixed step of the deterministic air hockey simulation.
///
/// Each call is one logical tick regardless of how much wall-clock time has
/// passed, so two peers stepping at different frame rates still agree on
/// the trajectory. Paddle input must be applied before calling this.
pub fn step(state: &mut TableState, config: &Config, events: &mut Events) {
    // Clear events at start of step
    events.clear();

    // 1-2. Integrate and apply friction
    move_puck(&mut state.puck, config);

    // 3. Side rails
    check_walls(&mut state.puck, config, events);

    // 4. End lines: goal mouth first, otherwise a rail
    check_goals(&mut state.puck, &mut state.score, config, events);

    // 5. Paddles, player 1 then player 2
    check_paddles(&mut state.puck, &state.paddles, config, events);

    // 6. Never let a non-finite puck escape the step
    guard_finite(&mut state.puck, config);

    state.tick += 1;
}

use game_core::systems::{apply_paddle_input, drive_ai_paddle};
use game_core::{step, Config, Events, PlayerSlot, TableState};
use glam::Vec2;

use crate::network::sound_for;
use crate::peer::FrameOutput;

/// Offline game against the built-in opponent.
///
/// The human defends the bottom goal; the AI drives the top paddle.
pub struct PracticeGame {
    pub config: Config,
    pub table: TableState,
    pub events: Events,
}

impl PracticeGame {
    pub const HUMAN: PlayerSlot = PlayerSlot::Player2;
    pub const AI: PlayerSlot = PlayerSlot::Player1;

    pub fn new(config: Config) -> Self {
        Self {
            table: TableState::new(&config),
            config,
            events: Events::new(),
        }
    }

    pub fn frame(&mut self, pointer: Option<Vec2>) -> FrameOutput {
        if let Some(pointer) = pointer {
            apply_paddle_input(&mut self.table.paddles, Self::HUMAN, pointer, &self.config);
        }
        drive_ai_paddle(self.table.paddles.get_mut(Self::AI), &self.table.puck, &self.config);

        step(&mut self.table, &self.config, &mut self.events);

        let cues = self.events.iter().map(sound_for).collect();
        FrameOutput::new(&self.table, &self.config, cues, self.events.goal())
    }

    pub fn is_over(&self) -> bool {
        self.table.score.has_winner(self.config.win_score).is_some()
    }

    /// New game, same settings
    pub fn reset(&mut self) {
        self.table = TableState::new(&self.config);
        self.events.clear();
    }
}

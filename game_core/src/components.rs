use glam::Vec2;

/// Which side of the table a participant plays on.
///
/// `Player1` defends the top goal (`y = 0`), `Player2` the bottom one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerSlot {
    Player1,
    Player2,
}

impl PlayerSlot {
    pub fn opponent(self) -> Self {
        match self {
            PlayerSlot::Player1 => PlayerSlot::Player2,
            PlayerSlot::Player2 => PlayerSlot::Player1,
        }
    }

    pub fn is_player1(self) -> bool {
        self == PlayerSlot::Player1
    }
}

/// Puck - the sliding disk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Puck {
    pub pos: Vec2,
    pub vel: Vec2,
}

impl Puck {
    pub fn new(pos: Vec2, vel: Vec2) -> Self {
        Self { pos, vel }
    }

    /// Puck resting at the given point
    pub fn at_rest(pos: Vec2) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
        }
    }

    /// Put the puck back on the center spot with no velocity
    pub fn reset(&mut self, center: Vec2) {
        self.pos = center;
        self.vel = Vec2::ZERO;
    }

    pub fn speed(&self) -> f32 {
        self.vel.length()
    }

    pub fn is_finite(&self) -> bool {
        self.pos.is_finite() && self.vel.is_finite()
    }
}

/// Paddle - a player's circular striker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub slot: PlayerSlot,
    pub pos: Vec2,
}

impl Paddle {
    pub fn new(slot: PlayerSlot, pos: Vec2) -> Self {
        Self { slot, pos }
    }
}

/// Both paddles on the table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddles {
    pub player1: Paddle,
    pub player2: Paddle,
}

impl Paddles {
    pub fn new(player1: Vec2, player2: Vec2) -> Self {
        Self {
            player1: Paddle::new(PlayerSlot::Player1, player1),
            player2: Paddle::new(PlayerSlot::Player2, player2),
        }
    }

    pub fn get(&self, slot: PlayerSlot) -> &Paddle {
        match slot {
            PlayerSlot::Player1 => &self.player1,
            PlayerSlot::Player2 => &self.player2,
        }
    }

    pub fn get_mut(&mut self, slot: PlayerSlot) -> &mut Paddle {
        match slot {
            PlayerSlot::Player1 => &mut self.player1,
            PlayerSlot::Player2 => &mut self.player2,
        }
    }

    /// Paddles in collision resolution order
    pub fn in_order(&self) -> [&Paddle; 2] {
        [&self.player1, &self.player2]
    }
}

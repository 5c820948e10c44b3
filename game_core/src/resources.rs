use crate::components::PlayerSlot;

/// Game score tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub player1: u32,
    pub player2: u32,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: PlayerSlot) -> u32 {
        match slot {
            PlayerSlot::Player1 => self.player1,
            PlayerSlot::Player2 => self.player2,
        }
    }

    pub fn increment(&mut self, slot: PlayerSlot) {
        match slot {
            PlayerSlot::Player1 => self.player1 += 1,
            PlayerSlot::Player2 => self.player2 += 1,
        }
    }

    pub fn has_winner(&self, win_score: u32) -> Option<PlayerSlot> {
        if self.player1 >= win_score {
            Some(PlayerSlot::Player1)
        } else if self.player2 >= win_score {
            Some(PlayerSlot::Player2)
        } else {
            None
        }
    }
}

/// Something that happened to the puck during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    WallHit,
    PaddleHit(PlayerSlot),
    Goal { scorer: PlayerSlot },
}

/// Events that occurred during this step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Events {
    list: Vec<GameEvent>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn push(&mut self, event: GameEvent) {
        self.list.push(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.list.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn hit_wall(&self) -> bool {
        self.list.contains(&GameEvent::WallHit)
    }

    pub fn hit_paddle(&self) -> bool {
        self.list
            .iter()
            .any(|e| matches!(e, GameEvent::PaddleHit(_)))
    }

    /// Scorer of the goal in this step, if any
    pub fn goal(&self) -> Option<PlayerSlot> {
        self.list.iter().find_map(|e| match e {
            GameEvent::Goal { scorer } => Some(*scorer),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_increment() {
        let mut score = Score::new();
        score.increment(PlayerSlot::Player1);
        score.increment(PlayerSlot::Player1);
        score.increment(PlayerSlot::Player2);
        assert_eq!(score.get(PlayerSlot::Player1), 2);
        assert_eq!(score.get(PlayerSlot::Player2), 1);
    }

    #[test]
    fn test_score_has_winner() {
        let mut score = Score::new();
        for _ in 0..6 {
            score.increment(PlayerSlot::Player2);
        }
        assert_eq!(score.has_winner(7), None, "No winner below threshold");
        score.increment(PlayerSlot::Player2);
        assert_eq!(
            score.has_winner(7),
            Some(PlayerSlot::Player2),
            "Player 2 should win at 7"
        );
    }

    #[test]
    fn test_events_queries() {
        let mut events = Events::new();
        assert!(events.is_empty());
        events.push(GameEvent::WallHit);
        events.push(GameEvent::PaddleHit(PlayerSlot::Player2));
        events.push(GameEvent::Goal {
            scorer: PlayerSlot::Player1,
        });

        assert_eq!(events.len(), 3);
        assert!(events.hit_wall());
        assert!(events.hit_paddle());
        assert_eq!(events.goal(), Some(PlayerSlot::Player1));

        events.clear();
        assert!(!events.hit_wall());
        assert!(!events.hit_paddle());
        assert_eq!(events.goal(), None);
    }
}

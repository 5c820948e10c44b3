use glam::Vec2;

/// Rate limit for outgoing `paddle_move`.
///
/// A changed position goes out at most once per `min_interval_ms`. Whatever
/// was last held back still goes out on a later poll, and an unchanged
/// position is repeated every `refresh_ms` so a lost packet heals itself.
#[derive(Debug, Clone)]
pub struct PaddleThrottle {
    min_interval_ms: u64,
    refresh_ms: u64,
    last_sent_at: Option<u64>,
    last_sent: Option<Vec2>,
}

impl PaddleThrottle {
    pub fn new(min_interval_ms: u64, refresh_ms: u64) -> Self {
        Self {
            min_interval_ms,
            refresh_ms: refresh_ms.max(min_interval_ms),
            last_sent_at: None,
            last_sent: None,
        }
    }

    /// Position to publish this frame, if any
    pub fn poll(&mut self, pos: Vec2, now_ms: u64) -> Option<Vec2> {
        let elapsed = match self.last_sent_at {
            None => u64::MAX,
            Some(at) => now_ms.saturating_sub(at),
        };
        let dirty = self.last_sent != Some(pos);
        let due = (dirty && elapsed >= self.min_interval_ms) || elapsed >= self.refresh_ms;
        if !due {
            return None;
        }
        self.last_sent_at = Some(now_ms);
        self.last_sent = Some(pos);
        Some(pos)
    }
}

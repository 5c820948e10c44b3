use std::time::Duration;

use serde::Deserialize;

/// Lobby timing and retry knobs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// A presence record older than this is treated as absent
    pub presence_ttl_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// How long a challenge stays answerable
    pub challenge_ttl_ms: u64,
    /// Join attempts before giving up on existing rooms and creating one
    pub max_join_attempts: u32,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            presence_ttl_ms: 15_000,
            heartbeat_interval_ms: 5_000,
            challenge_ttl_ms: 30_000,
            max_join_attempts: 5,
        }
    }
}

impl LobbyConfig {
    /// Never zero; a zero period would stop the heartbeat task
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }
}

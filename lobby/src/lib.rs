//! Lobby coordination for air hockey: presence, blind-queue matchmaking and
//! direct challenges, all expressed as conditional writes against a shared
//! row store. There is no server-side game logic; two peers converge on a
//! [`Session`] purely through the store and its change notifications.

pub mod challenge;
pub mod clock;
pub mod config;
pub mod error;
pub mod fsm;
pub mod matchmaking;
pub mod presence;
pub mod records;
pub mod store;

pub use challenge::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use fsm::*;
pub use matchmaking::*;
pub use presence::*;
pub use records::*;
pub use store::*;

use std::sync::Arc;

/// Shared handles every lobby service needs
pub struct LobbyContext<B> {
    pub backend: Arc<B>,
    pub clock: Arc<dyn Clock>,
    pub config: LobbyConfig,
}

impl<B> Clone for LobbyContext<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<B: Backend> LobbyContext<B> {
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>, config: LobbyConfig) -> Self {
        Self {
            backend,
            clock,
            config,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }
}

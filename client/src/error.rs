use lobby::LobbyError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The broadcast topic is gone or we already left it
    #[error("channel {topic}: {reason}")]
    Channel { topic: String, reason: String },

    #[error("wire codec: {0}")]
    Codec(#[from] postcard::Error),

    #[error("identity file: {0}")]
    Identity(#[from] std::io::Error),

    #[error("identity file is corrupt: {0}")]
    IdentityFormat(#[from] serde_json::Error),

    #[error("settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A background task panicked or was cancelled
    #[error("background task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

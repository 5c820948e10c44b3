//! Device identity, generated once and kept on disk.

use std::path::{Path, PathBuf};

use proto::PlayerId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub device_id: PlayerId,
    pub nickname: String,
}

impl Identity {
    /// Fresh random identity with a `Player-XXXX` nickname
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let tag: String = uuid
            .simple()
            .to_string()
            .chars()
            .take(4)
            .collect::<String>()
            .to_uppercase();
        Self {
            device_id: PlayerId::new(uuid.to_string()),
            nickname: format!("Player-{tag}"),
        }
    }

    /// `<data dir>/airhockey/identity.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("airhockey").join("identity.json"))
    }

    /// Read the stored identity, creating and saving one on first run
    pub fn load_or_create(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let identity = Self::generate();
                identity.save(path)?;
                info!(device = %identity.device_id, path = %path.display(), "created device identity");
                Ok(identity)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

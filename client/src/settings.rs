//! Client settings, read from `settings.toml`.
//!
//! Every field has a default, so a missing or empty file is a valid
//! configuration and a partial file only overrides what it names.

use std::path::{Path, PathBuf};

use lobby::LobbyConfig;
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Overrides the nickname stored with the device identity
    pub nickname: Option<String>,
    /// Where the identity file lives; defaults under the user data dir
    pub identity_path: Option<PathBuf>,
    pub lobby: LobbyConfig,
    pub sync: SyncSettings,
    pub log: LogSettings,
}

/// In-match timing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub frame_interval_ms: u64,
    /// Minimum gap between two `paddle_move` sends
    pub paddle_interval_ms: u64,
    /// Resend an unchanged paddle this often
    pub paddle_refresh_ms: u64,
    /// Resend the score every this many frames even without a goal
    pub score_refresh_frames: u32,
    /// Per-member receive queue of the in-process hub
    pub hub_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            paddle_interval_ms: 16,
            paddle_refresh_ms: 250,
            score_refresh_frames: 60,
            hub_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "airhockey=info,client=info,lobby=info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// `<config dir>/airhockey/settings.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("airhockey").join("settings.toml"))
    }

    /// Load settings. A missing or empty file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(content)?)
    }
}

//! Air hockey client core: who simulates, how the two peers stay in sync,
//! the per-frame match loop, offline practice, and the local bits a device
//! keeps (identity and settings). Rendering and audio live elsewhere and
//! consume [`FrameOutput`].

pub mod authority;
pub mod channel;
pub mod error;
pub mod identity;
pub mod network;
pub mod notice;
pub mod peer;
pub mod practice;
pub mod recorder;
pub mod settings;
pub mod state;
pub mod telemetry;
pub mod throttle;

pub use authority::{Role, Seat};
pub use channel::{HubChannel, MemoryHub, SyncChannel, Transport};
pub use error::{ClientError, Result};
pub use identity::Identity;
pub use notice::Notice;
pub use peer::{FrameInput, FrameOutput, MatchPeer};
pub use practice::PracticeGame;
pub use recorder::MatchRecorder;
pub use settings::{LogSettings, Settings, SyncSettings};
pub use state::MatchView;
pub use throttle::PaddleThrottle;

use game_core::systems::drive_ai_paddle;
use game_core::Config;
use glam::Vec2;

/// Pointer position a hands-off player would produce: go for a resting
/// puck, otherwise play it like the practice opponent.
pub fn autopilot(view: &MatchView, config: &Config) -> Vec2 {
    let puck = &view.table().puck;
    if puck.speed() < 0.5 {
        return puck.pos;
    }
    let mut paddle = *view.my_paddle();
    drive_ai_paddle(&mut paddle, puck, config);
    paddle.pos
}

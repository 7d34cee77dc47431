//! Configuration types.

use serde::{Deserialize, Serialize};

/// Per-server wrapper settings, stored as `wrapper.toml` in the server
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    /// Version of the currently installed `server.jar`. `"0.0"` means no
    /// server has been installed yet.
    pub server_version: String,
    /// Version to install or update to; `"latest"` tracks the newest
    /// release.
    pub preferred_version: String,
    /// Check for and download a newer server on startup.
    pub auto_update: bool,
    /// Consider snapshot versions when resolving `"latest"`.
    pub use_snapshot: bool,
    /// Restart the server when it exits without a user stop request.
    pub auto_restart: bool,
    /// Seconds to wait before an automatic restart.
    pub restart_delay: u64,
    /// Consecutive failed restarts tolerated before giving up.
    pub restart_attempts: u32,
    /// Hours between scheduled restarts; zero or negative disables them.
    pub scheduled_restart: f64,
    /// Forward events to a webhook per `webhook.toml`.
    pub use_webhook: bool,
    /// Let Herobrine haunt the chat per `herobrine.toml`.
    pub use_herobrine: bool,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            server_version: "0.0".to_string(),
            preferred_version: "latest".to_string(),
            auto_update: false,
            use_snapshot: false,
            auto_restart: true,
            restart_delay: 5,
            restart_attempts: 5,
            scheduled_restart: 0.0,
            use_webhook: false,
            use_herobrine: false,
        }
    }
}

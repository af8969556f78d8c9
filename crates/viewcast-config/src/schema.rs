//! Configuration schema types for Viewcast.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Top-level Viewcast configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewcastConfig {
    pub server: ServerConfig,
    pub presence: PresenceSettings,
}

// =============================================================================
// Server
// =============================================================================

/// Realtime endpoint and credential location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base WebSocket URL of the realtime gateway. The livestream presence
    /// channel lives under the `/livestream` path of this address.
    pub base_url: String,
    /// Path to the token file written by the login flow. When unset, no
    /// credential is available and presence tracking silently stays off.
    pub token_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "wss://api.viewcast.tv/realtime".into(),
            token_path: None,
        }
    }
}

// =============================================================================
// Presence
// =============================================================================

/// Tunables for the viewer-presence connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    /// Connection attempts per connect cycle before giving up.
    pub connect_attempts: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Per-attempt handshake timeout, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            retry_delay_ms: 1000,
            connect_timeout_secs: 10,
        }
    }
}

//! Wire messages for the livestream presence channel.
//!
//! Every frame is a JSON envelope of the form `{"event": ..., "data": ...}`.
//! Unknown server events are tolerated by the session task (logged at debug
//! and dropped) so the gateway can add events without breaking old clients.

use serde::{Deserialize, Serialize};
use viewcast_common::LivestreamId;

/// Client-to-server announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinLivestream { livestream_id: LivestreamId },
    #[serde(rename_all = "camelCase")]
    LeaveLivestream { livestream_id: LivestreamId },
}

/// Server-to-client pushes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    ViewerCount { count: u64 },
    Error { message: String },
}

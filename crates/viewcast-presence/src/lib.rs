//! Livestream viewer-presence client.
//!
//! Maintains one realtime connection per observed livestream, announces
//! presence on connect, receives server-pushed viewer-count updates, and
//! tears down cleanly when the observer stops or switches livestreams.
//! Presence is best-effort: every failure is absorbed into a connection
//! status flag and never surfaces to the caller.

pub mod auth;
pub mod connector;
pub mod protocol;
pub mod session;
mod task;

pub use auth::{CredentialStore, StaticToken, TokenFile};
pub use connector::{Connector, PresenceTransport, WsConnector};
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{ConnectionState, PresenceClient, PresenceHandle, SessionOptions};

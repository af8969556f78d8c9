use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures inside the presence transport. These never reach the UI layer;
/// the session task absorbs them into its connection state.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out after {0}s")]
    ConnectTimeout(u64),

    #[error("send failed: {0}")]
    Send(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ViewcastError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

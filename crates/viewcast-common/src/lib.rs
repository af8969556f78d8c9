pub mod errors;
pub mod format;
pub mod id;

pub use errors::{ConfigError, PresenceError, ViewcastError};
pub use format::{format_duration, format_viewer_count, valid_stream_key};
pub use id::{new_id, LivestreamId};

pub type Result<T> = std::result::Result<T, ViewcastError>;

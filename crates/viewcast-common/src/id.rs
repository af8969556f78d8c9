use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Opaque livestream identifier assigned by the content backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LivestreamId(String);

impl LivestreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LivestreamId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for LivestreamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for LivestreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

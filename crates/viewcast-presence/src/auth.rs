//! Credential seam for the presence connection.
//!
//! The session task re-reads the token through this trait on every
//! connection attempt, so a login or refresh between reconnects is picked
//! up without restarting the session. The store is read-only from this
//! crate's perspective.

use async_trait::async_trait;
use std::path::PathBuf;

/// Read-only access to the signed-in user's bearer token.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the current access token, or `None` when signed out.
    async fn access_token(&self) -> Option<String>;
}

/// Token file written by the login flow. Re-read from disk on every call.
///
/// Accepts either a bare token string or a JSON object with an
/// `access_token` field.
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for TokenFile {
    async fn access_token(&self) -> Option<String> {
        let raw = tokio::fs::read_to_string(&self.path).await.ok()?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return value
                .get("access_token")
                .and_then(|t| t.as_str())
                .map(str::to_string);
        }
        Some(trimmed.to_string())
    }
}

/// Fixed in-memory credential, for tests and `--token` overrides.
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// A store that behaves as signed out.
    pub fn absent() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CredentialStore for StaticToken {
    async fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

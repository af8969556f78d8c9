//! Background task driving one presence session.
//!
//! Lifecycle per connect cycle: read a fresh token, connect with a bounded
//! number of attempts, announce presence exactly once, then apply server
//! pushes until the connection drops or the session is cancelled. Dropped
//! connections re-enter the cycle with a fresh retry budget; cancellation
//! retracts presence and closes before the task exits.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use viewcast_common::LivestreamId;

use crate::auth::CredentialStore;
use crate::connector::{presence_url, Connector, PresenceTransport};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::{ConnectionState, SessionOptions};

pub(crate) struct SessionContext {
    pub(crate) livestream_id: LivestreamId,
    pub(crate) base_url: String,
    pub(crate) options: SessionOptions,
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) viewer_count: Arc<RwLock<Option<u64>>>,
    pub(crate) state: Arc<RwLock<ConnectionState>>,
    pub(crate) cancel: CancellationToken,
}

impl SessionContext {
    async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }
}

enum ConnectOutcome {
    Connected(Box<dyn PresenceTransport>),
    /// Signed out; presence silently stays off.
    NoCredential,
    /// Retry budget exhausted.
    Exhausted,
    Cancelled,
}

enum RunExit {
    /// Observer stopped the session.
    Cancelled,
    /// The connection dropped while still observing.
    Dropped,
}

pub(crate) async fn session_task(ctx: SessionContext) {
    loop {
        let transport = match connect_with_retry(&ctx).await {
            ConnectOutcome::Connected(transport) => transport,
            ConnectOutcome::NoCredential => {
                ctx.set_state(ConnectionState::Disconnected).await;
                return;
            }
            ConnectOutcome::Exhausted => {
                warn!(
                    livestream = %ctx.livestream_id,
                    attempts = ctx.options.connect_attempts,
                    "presence connection attempts exhausted"
                );
                ctx.set_state(ConnectionState::Errored).await;
                return;
            }
            ConnectOutcome::Cancelled => {
                ctx.set_state(ConnectionState::Disconnected).await;
                return;
            }
        };

        match run_connection(&ctx, transport).await {
            RunExit::Cancelled => {
                ctx.set_state(ConnectionState::Disconnected).await;
                return;
            }
            RunExit::Dropped => {
                ctx.set_state(ConnectionState::Disconnected).await;
                // Still observing: reconnect with a fresh retry budget.
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

async fn connect_with_retry(ctx: &SessionContext) -> ConnectOutcome {
    for attempt in 1..=ctx.options.connect_attempts {
        if ctx.cancel.is_cancelled() {
            return ConnectOutcome::Cancelled;
        }

        // Fresh token per attempt; a refresh between attempts is picked up.
        let Some(token) = ctx.store.access_token().await else {
            debug!(
                livestream = %ctx.livestream_id,
                "no access token, skipping presence connection"
            );
            return ConnectOutcome::NoCredential;
        };

        ctx.set_state(ConnectionState::Connecting).await;
        let url = presence_url(&ctx.base_url, &token);

        tokio::select! {
            _ = ctx.cancel.cancelled() => return ConnectOutcome::Cancelled,
            result = ctx.connector.connect(&url) => match result {
                Ok(transport) => return ConnectOutcome::Connected(transport),
                Err(e) => {
                    warn!(
                        livestream = %ctx.livestream_id,
                        attempt,
                        error = %e,
                        "presence connect failed"
                    );
                }
            }
        }

        if attempt < ctx.options.connect_attempts {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return ConnectOutcome::Cancelled,
                _ = tokio::time::sleep(ctx.options.retry_delay) => {}
            }
        }
    }
    ConnectOutcome::Exhausted
}

// ---------------------------------------------------------------------------
// Connected phase
// ---------------------------------------------------------------------------

async fn run_connection(ctx: &SessionContext, mut transport: Box<dyn PresenceTransport>) -> RunExit {
    ctx.set_state(ConnectionState::Connected).await;

    // Announce presence exactly once per connection. The flag lives on the
    // stack of this connection's run, so a reconnect naturally re-announces.
    let mut announced = false;
    let join = ClientMessage::JoinLivestream {
        livestream_id: ctx.livestream_id.clone(),
    };
    match serde_json::to_string(&join) {
        Ok(json) => match transport.send(json).await {
            Ok(()) => {
                announced = true;
                debug!(livestream = %ctx.livestream_id, "announced presence");
            }
            Err(e) => {
                warn!(livestream = %ctx.livestream_id, error = %e, "presence announce failed");
                transport.close().await;
                return RunExit::Dropped;
            }
        },
        Err(e) => {
            warn!(error = %e, "failed to encode join message");
            transport.close().await;
            return RunExit::Dropped;
        }
    }

    let exit = loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break RunExit::Cancelled,
            frame = transport.recv() => match frame {
                Ok(Some(text)) => handle_server_message(ctx, &text).await,
                Ok(None) => {
                    info!(livestream = %ctx.livestream_id, "presence connection closed by server");
                    break RunExit::Dropped;
                }
                Err(e) => {
                    warn!(livestream = %ctx.livestream_id, error = %e, "presence transport error");
                    break RunExit::Dropped;
                }
            }
        }
    };

    // On voluntary teardown, retract presence for the joined livestream.
    // The close below runs regardless of whether the leave send succeeds.
    if matches!(exit, RunExit::Cancelled) && announced {
        let leave = ClientMessage::LeaveLivestream {
            livestream_id: ctx.livestream_id.clone(),
        };
        if let Ok(json) = serde_json::to_string(&leave) {
            if let Err(e) = transport.send(json).await {
                debug!(livestream = %ctx.livestream_id, error = %e, "presence leave failed");
            }
        }
    }
    transport.close().await;
    exit
}

async fn handle_server_message(ctx: &SessionContext, text: &str) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::ViewerCount { count }) => {
            debug!(livestream = %ctx.livestream_id, count, "viewer count update");
            *ctx.viewer_count.write().await = Some(count);
        }
        Ok(ServerMessage::Error { message }) => {
            // Server-side errors are informational; the connection stays up.
            warn!(livestream = %ctx.livestream_id, message = %message, "presence server error");
        }
        Err(_) => {
            debug!(text = %text, "unrecognized presence message");
        }
    }
}

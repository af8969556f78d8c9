mod cli;
#[allow(dead_code)]
mod player;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use viewcast_common::{format_viewer_count, LivestreamId};
use viewcast_config::ViewcastConfig;
use viewcast_presence::{
    ConnectionState, CredentialStore, PresenceClient, SessionOptions, StaticToken, TokenFile,
    WsConnector,
};

#[tokio::main]
async fn main() {
    let args = cli::parse();

    // Initialize logging
    let log_directive = args.log_level.as_deref().unwrap_or("viewcast=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "viewcast=info".parse().unwrap()),
            ),
        )
        .init();

    tracing::info!("Viewcast v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load config
    let config = if let Some(ref path) = args.config {
        tracing::info!("Using config override: {path}");
        viewcast_config::toml_loader::load_from_path(Path::new(path)).unwrap_or_else(|e| {
            tracing::warn!("Config load failed, using defaults: {e}");
            ViewcastConfig::default()
        })
    } else {
        viewcast_config::load_config().unwrap_or_else(|e| {
            tracing::warn!("Config load failed, using defaults: {e}");
            ViewcastConfig::default()
        })
    };
    tracing::info!("Config loaded (server: {})", config.server.base_url);

    // Credential store: inline token override beats the configured file.
    let store: Arc<dyn CredentialStore> = match (&args.token, &config.server.token_path) {
        (Some(token), _) => Arc::new(StaticToken::new(token.clone())),
        (None, Some(path)) => Arc::new(TokenFile::new(path.clone())),
        (None, None) => {
            tracing::warn!("No token configured; presence tracking will stay off");
            Arc::new(StaticToken::absent())
        }
    };

    let connector = Arc::new(WsConnector::new(Duration::from_secs(
        config.presence.connect_timeout_secs,
    )));
    let options = SessionOptions {
        connect_attempts: config.presence.connect_attempts,
        retry_delay: Duration::from_millis(config.presence.retry_delay_ms),
    };
    let client = PresenceClient::new(config.server.base_url.clone(), store, connector, options);

    let livestream_id = LivestreamId::from(args.livestream_id);
    let mut player = player::PlayerState::new();
    player.load_livestream(livestream_id.clone());

    tracing::info!("Observing livestream {livestream_id}");
    let handle = client.observe(Some(livestream_id));

    // Report viewer-count changes until Ctrl-C.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut last_count = None;
    let mut last_state = ConnectionState::Disconnected;
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for shutdown signal: {e}");
                }
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                let state = handle.connection_state().await;
                if state != last_state {
                    tracing::info!("Presence connection: {state:?}");
                    last_state = state;
                }
                let count = handle.viewer_count().await;
                if count != last_count {
                    if let Some(c) = count {
                        tracing::info!("{} watching", format_viewer_count(c));
                    }
                    last_count = count;
                }
            }
        }
    }

    tracing::info!("Shutting down");
    handle.stop().await;
    player.clear();
    tracing::info!("Shutdown complete");
}

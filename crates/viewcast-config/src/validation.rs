//! Full configuration validation.
//!
//! Validates the endpoint URL scheme and all numeric ranges.

use crate::schema::ViewcastConfig;
use viewcast_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ViewcastConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    // Endpoint scheme
    let url = &config.server.base_url;
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(format!(
            "server.base_url must start with ws:// or wss:// (got '{url}')"
        ));
    }

    // Presence constraints
    validate_range(
        &mut errors,
        "presence.connect_attempts",
        u64::from(config.presence.connect_attempts),
        1,
        10,
    );
    validate_range(
        &mut errors,
        "presence.retry_delay_ms",
        config.presence.retry_delay_ms,
        100,
        60_000,
    );
    validate_range(
        &mut errors,
        "presence.connect_timeout_secs",
        config.presence.connect_timeout_secs,
        1,
        60,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range(errors: &mut Vec<String>, field: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{field} must be between {min} and {max} (got {value})"));
    }
}

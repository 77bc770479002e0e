//! Gateway backend implementations.
//!
//! `build(config, api_key)` is the factory — called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dry_run;
pub mod waha;

use crate::config::GatewayConfig;
use crate::gateway::{GatewayClient, GatewayError};

/// Construct a `GatewayClient` from config and an optional API key.
///
/// `api_key` is sourced from `GATEWAY_API_KEY` env (never TOML).
pub fn build(config: &GatewayConfig, api_key: Option<String>) -> Result<GatewayClient, GatewayError> {
    match config.provider.as_str() {
        "waha" => {
            let client = waha::WahaClient::new(config.base_url.clone(), config.timeout_seconds, api_key)?;
            Ok(GatewayClient::Waha(client))
        }
        "dry_run" | "dry-run" => Ok(GatewayClient::DryRun(dry_run::DryRunGateway::new())),
        other => Err(GatewayError::UnknownProvider(other.to_string())),
    }
}

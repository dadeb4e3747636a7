//! Tracing subscriber setup
//!
//! The services only emit `tracing` events; installing a subscriber is left
//! to the embedding process. These helpers install the standard one.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

const DEFAULT_FILTER: &str = "blackroad_api=debug,info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a JSON subscriber filtered by `RUST_LOG`.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing() -> ApiResult<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json())
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(filter = DEFAULT_FILTER, "Telemetry initialized");
    Ok(())
}

/// Human-readable variant of `init_tracing` for local runs.
pub fn init_tracing_pretty() -> ApiResult<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().pretty())
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))
}

//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use mediarelay_core::RelayConfig;
use std::sync::Arc;

/// Validate configuration, start telemetry, bootstrap collaborators, and build
/// the router.
pub async fn initialize_app(config: RelayConfig) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    mediarelay_infra::init_telemetry(config.is_production())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.base.environment,
        target_kbps = config.target_kbps,
        destination_dir = %config.destination_dir,
        persistence = config.persistence.is_configured(),
        "Configuration loaded and validated successfully"
    );

    let state = services::initialize_services(&config).await?;
    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}

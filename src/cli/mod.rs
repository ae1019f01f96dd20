pub mod config_cmd;
pub mod ingest_cmd;
pub mod output;
pub mod renderer;
pub mod serve_cmd;
pub mod show_cmd;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::cost::ingest::IngestionService;
use crate::core::cost::store;

/// Load config and wire the configured store into a service.
pub fn open_service() -> Result<(AppConfig, IngestionService)> {
    let config = AppConfig::load().context("Failed to load config")?;
    let clock = config.zone_clock()?;
    let service = IngestionService::new(store::open(&config.store), clock);
    Ok((config, service))
}

pub fn open_shared_service() -> Result<(AppConfig, Arc<IngestionService>)> {
    let (config, service) = open_service()?;
    Ok((config, Arc::new(service)))
}

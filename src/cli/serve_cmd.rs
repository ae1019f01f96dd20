use anyhow::Result;

use crate::cli::open_shared_service;
use crate::cli::output::OutputOptions;
use crate::server::{self, AppState};

pub async fn run(host: Option<String>, port: Option<u16>, _opts: &OutputOptions) -> Result<()> {
    let (mut config, service) = open_shared_service()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    // Report an unreadable store at startup.
    if let Err(e) = service.state() {
        tracing::warn!("state store not readable yet: {e}");
    }

    server::serve(&config.server, AppState::new(service)).await
}

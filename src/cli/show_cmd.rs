use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;

use crate::cli::open_service;
use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::clock::ZoneClock;
use crate::core::config::AppConfig;
use crate::core::formatter;
use crate::core::models::snapshot::WeeklySnapshot;
use crate::core::models::state::WeeklyCostState;

#[derive(Serialize)]
struct StatePayload {
    state: WeeklyCostState,
    snapshot: Option<WeeklySnapshot>,
}

/// Print the dashboard snapshot.
pub fn show(opts: &OutputOptions) -> Result<()> {
    let (_config, service) = open_service()?;
    let formatted = service
        .query()
        .with_context(|| format!("Failed to read snapshot from {}", service.store().describe()))?;

    match opts.format {
        OutputFormat::Text => println!("{}", renderer::render_snapshot(&formatted, opts.use_color)),
        OutputFormat::Json => opts.print_json(&formatted)?,
    }
    Ok(())
}

/// Print the raw accumulator state.
pub fn state(opts: &OutputOptions) -> Result<()> {
    let (_config, service) = open_service()?;
    let state = service
        .state()
        .with_context(|| format!("Failed to read state from {}", service.store().describe()))?;

    match opts.format {
        OutputFormat::Text => println!("{}", renderer::render_state(&state, opts.use_color)),
        OutputFormat::Json => {
            let snapshot = service.latest()?;
            opts.print_json(&StatePayload { state, snapshot })?
        }
    }
    Ok(())
}

/// Format a raw scraper payload (file or stdin) the way the dashboard would
/// show it, without touching the store.
pub fn preview(path: Option<PathBuf>, opts: &OutputOptions) -> Result<()> {
    let content = match &path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    let value: Value = serde_json::from_str(&content).context("Input is not valid JSON")?;
    let fields = value
        .as_object()
        .context("Input must be a JSON object")?;

    let clock: ZoneClock = AppConfig::load()
        .ok()
        .and_then(|c| c.zone_clock().ok())
        .unwrap_or_default();
    let formatted = formatter::format_raw(fields, clock.now());

    match opts.format {
        OutputFormat::Text => println!("{}", renderer::render_snapshot(&formatted, opts.use_color)),
        OutputFormat::Json => opts.print_json(&formatted)?,
    }
    Ok(())
}

/// Forget the persisted state and snapshot.
pub fn reset(yes: bool, _opts: &OutputOptions) -> Result<()> {
    let (_config, service) = open_service()?;
    if !yes {
        eprintln!(
            "This clears the weekly total stored in {}.",
            service.store().describe()
        );
        eprintln!("Re-run with --yes to confirm.");
        std::process::exit(1);
    }
    service.clear()?;
    println!("Cleared weekly cost state ({})", service.store().describe());
    Ok(())
}

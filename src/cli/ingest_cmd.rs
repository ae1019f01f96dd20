use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;

use crate::cli::open_service;
use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::clock::ZoneClock;
use crate::core::config::AppConfig;
use crate::core::formatter;
use crate::core::models::sample::{parse_currency, DailySample};

const PUSH_TIMEOUT: Duration = Duration::from_secs(20);

/// Figures as typed on the command line or copied from the console.
pub struct SampleArgs {
    pub daily_cost: String,
    pub balance: Option<String>,
    pub at: Option<String>,
}

impl SampleArgs {
    fn to_sample(&self, clock: &ZoneClock) -> Result<DailySample> {
        let daily = parse_currency(&self.daily_cost)
            .with_context(|| format!("Unreadable daily cost: '{}'", self.daily_cost))?;
        let balance = match &self.balance {
            Some(raw) => Some(
                parse_currency(raw).with_context(|| format!("Unreadable balance: '{}'", raw))?,
            ),
            None => None,
        };
        let collected_at = match &self.at {
            Some(raw) => clock
                .parse_timestamp(raw)
                .with_context(|| format!("Unreadable timestamp: '{}'", raw))?,
            None => clock.now(),
        };
        Ok(DailySample::new(daily, collected_at).with_balance(balance))
    }
}

/// Apply one sample directly against the configured store.
pub fn ingest(args: &SampleArgs, opts: &OutputOptions) -> Result<()> {
    let (_config, service) = open_service()?;
    let sample = args.to_sample(service.clock())?;
    let snapshot = service.receive(sample).context("Ingestion failed")?;

    match opts.format {
        OutputFormat::Text => {
            let formatted = formatter::format_snapshot(&snapshot);
            println!("{}", renderer::render_snapshot(&formatted, opts.use_color));
        }
        OutputFormat::Json => opts.print_json(&snapshot)?,
    }
    Ok(())
}

/// Send one sample to a running server.
pub async fn push(args: &SampleArgs, url: Option<String>, opts: &OutputOptions) -> Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let clock = config.zone_clock()?;
    let url = url.unwrap_or(config.push.url);
    validate_endpoint(&url)?;

    let payload = args.to_sample(&clock)?.to_payload();
    if opts.verbose {
        eprintln!("POST {} {}", url, payload);
    }

    let client = reqwest::Client::builder()
        .timeout(PUSH_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .post(&url)
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("Failed to send sample to {}", url))?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        let detail = body
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or("no detail");
        anyhow::bail!("HTTP {} from {}: {}", status.as_u16(), url, detail);
    }

    match opts.format {
        OutputFormat::Text => {
            let weekly = body
                .get("custo_semanal_acumulado")
                .and_then(Value::as_f64)
                .map(formatter::format_brl)
                .unwrap_or_else(|| formatter::MISSING.to_string());
            println!("Sample accepted. Weekly total: {}", weekly);
        }
        OutputFormat::Json => opts.print_json(&body)?,
    }
    Ok(())
}

/// Only loopback targets may use plain HTTP.
pub fn validate_endpoint(url: &str) -> Result<()> {
    if url.starts_with("https://") {
        return Ok(());
    }
    if let Some(rest) = url.strip_prefix("http://") {
        let authority = rest.split('/').next().unwrap_or("");
        let host = if let Some(bracketed) = authority.strip_prefix('[') {
            bracketed.split(']').next().unwrap_or("")
        } else {
            authority.split(':').next().unwrap_or("")
        };
        if matches!(host, "127.0.0.1" | "localhost" | "::1") {
            return Ok(());
        }
    }
    anyhow::bail!("push endpoint must use HTTPS unless it is loopback, got: {}", url)
}

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::models::sample::{
    FIELD_BALANCE, FIELD_COLLECTED_AT, FIELD_DAILY_COST, FIELD_LEGACY_WEEKLY, FIELD_WEEKLY_TOTAL,
};
use crate::core::models::snapshot::WeeklySnapshot;

/// Shown before the first sample has been ingested.
pub const PENDING: &str = "Carregando...";
/// Shown when the store cannot be read.
pub const UNAVAILABLE: &str = "Indisponível";
/// Shown for an individual figure the scraper could not read.
pub const MISSING: &str = "N/A";

/// Display-ready figures for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedSnapshot {
    pub saldo_atual: String,
    pub custo_diario: String,
    pub custo_semanal: String,
    pub data_coleta: String,
}

/// Returns "R$ 1234,56": two decimals, comma separator, no grouping.
pub fn format_brl(value: f64) -> String {
    // Avoid "R$ -0,00" for tiny negative rounding residue.
    let value = if value.abs() < 0.005 { 0.0 } else { value };
    format!("R$ {:.2}", value).replace('.', ",")
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_brl).unwrap_or_else(|| MISSING.to_string())
}

fn sentinel(text: &str, now: DateTime<FixedOffset>) -> FormattedSnapshot {
    FormattedSnapshot {
        saldo_atual: text.to_string(),
        custo_diario: text.to_string(),
        custo_semanal: text.to_string(),
        data_coleta: now.to_rfc3339(),
    }
}

/// Placeholder shape returned before anything was collected.
pub fn pending(now: DateTime<FixedOffset>) -> FormattedSnapshot {
    sentinel(PENDING, now)
}

/// Placeholder shape returned when the store is down.
pub fn unavailable(now: DateTime<FixedOffset>) -> FormattedSnapshot {
    sentinel(UNAVAILABLE, now)
}

pub fn format_snapshot(snapshot: &WeeklySnapshot) -> FormattedSnapshot {
    FormattedSnapshot {
        saldo_atual: format_optional(snapshot.balance),
        custo_diario: format_brl(snapshot.daily_cost_total),
        custo_semanal: format_brl(snapshot.weekly_total),
        data_coleta: snapshot.collected_at.to_rfc3339(),
    }
}

/// Format a raw, possibly unprocessed payload (older scraper output or a
/// hand-written cache file). An object with none of the known figures is
/// treated as "nothing collected yet".
pub fn format_raw(fields: &Map<String, Value>, now: DateTime<FixedOffset>) -> FormattedSnapshot {
    let number = |key: &str| fields.get(key).and_then(Value::as_f64);
    let balance = number(FIELD_BALANCE);
    let daily = number(FIELD_DAILY_COST);
    let weekly = number(FIELD_WEEKLY_TOTAL).or_else(|| number(FIELD_LEGACY_WEEKLY));

    if balance.is_none() && daily.is_none() && weekly.is_none() {
        return pending(now);
    }

    let collected = fields
        .get(FIELD_COLLECTED_AT)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .unwrap_or(now);

    FormattedSnapshot {
        saldo_atual: format_optional(balance),
        custo_diario: format_optional(daily),
        custo_semanal: format_optional(weekly),
        data_coleta: collected.to_rfc3339(),
    }
}

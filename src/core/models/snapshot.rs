use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Latest computed figures, persisted next to the state for fast reads.
///
/// Serialized flat, using the dashboard's field names; any pass-through
/// fields from the scraper ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySnapshot {
    #[serde(rename = "saldo_atual", default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(rename = "custo_diario_total")]
    pub daily_cost_total: f64,
    #[serde(rename = "custo_semanal_acumulado")]
    pub weekly_total: f64,
    #[serde(rename = "data_coleta")]
    pub collected_at: DateTime<FixedOffset>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

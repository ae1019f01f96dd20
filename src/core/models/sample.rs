use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

use crate::core::clock::ZoneClock;
use crate::core::error::CostError;

pub const FIELD_DAILY_COST: &str = "custo_diario_total";
pub const FIELD_BALANCE: &str = "saldo_atual";
pub const FIELD_COLLECTED_AT: &str = "data_coleta";
pub const FIELD_WEEKLY_TOTAL: &str = "custo_semanal_acumulado";
/// Older scraper builds sent a zeroed weekly placeholder under this key.
pub const FIELD_LEGACY_WEEKLY: &str = "custo_semanal";
/// The scraper reports its own failures in-band under this key.
pub const FIELD_SCRAPE_ERROR: &str = "erro";

/// Largest daily cost accepted. Keeps every sum and cent rounding well inside
/// the exact range of `f64`.
pub const MAX_DAILY_COST: f64 = 1e12;

/// Reject daily costs that are negative, non-finite or absurdly large.
pub fn check_daily_cost(value: f64) -> Result<(), CostError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CostError::invalid(format!(
            "{} must be >= 0, got {}",
            FIELD_DAILY_COST, value
        )));
    }
    if value > MAX_DAILY_COST {
        return Err(CostError::invalid(format!(
            "{} must be <= {}, got {}",
            FIELD_DAILY_COST, MAX_DAILY_COST, value
        )));
    }
    Ok(())
}

/// One scrape of the operator console.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySample {
    /// Cost so far today, as reported by the dialer.
    pub daily_cost_total: f64,
    /// When the sample was taken, in the operator's offset.
    pub collected_at: DateTime<FixedOffset>,
    /// Account balance. Absent when the scraper could not read it.
    pub balance: Option<f64>,
    /// Fields copied verbatim into the snapshot.
    pub extra: Map<String, Value>,
}

impl DailySample {
    pub fn new(daily_cost_total: f64, collected_at: DateTime<FixedOffset>) -> Self {
        Self {
            daily_cost_total,
            collected_at,
            balance: None,
            extra: Map::new(),
        }
    }

    pub fn with_balance(mut self, balance: Option<f64>) -> Self {
        self.balance = balance;
        self
    }

    /// Validate an ingestion payload.
    ///
    /// `custo_diario_total` must be a non-negative number. `saldo_atual` may
    /// be a number, `null` or missing. `data_coleta` defaults to the clock's
    /// current time. Weekly totals sent by the producer are dropped since they
    /// are computed here.
    pub fn from_payload(payload: Value, clock: &ZoneClock) -> Result<Self, CostError> {
        let Value::Object(mut fields) = payload else {
            return Err(CostError::invalid("payload must be a JSON object"));
        };

        if let Some(err) = fields.get(FIELD_SCRAPE_ERROR) {
            if !err.is_null() {
                return Err(CostError::invalid(format!("scraper reported an error: {}", err)));
            }
        }

        let daily_cost_total = match fields.remove(FIELD_DAILY_COST) {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| CostError::invalid(format!("{} is not representable", FIELD_DAILY_COST)))?,
            Some(Value::Null) | None => {
                return Err(CostError::invalid(format!("{} is required", FIELD_DAILY_COST)))
            }
            Some(other) => {
                return Err(CostError::invalid(format!(
                    "{} must be a number, got {}",
                    FIELD_DAILY_COST, other
                )))
            }
        };
        check_daily_cost(daily_cost_total)?;

        let balance = match fields.remove(FIELD_BALANCE) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(CostError::invalid(format!(
                    "{} must be a number or null, got {}",
                    FIELD_BALANCE, other
                )))
            }
        };

        let collected_at = match fields.remove(FIELD_COLLECTED_AT) {
            Some(Value::String(raw)) => clock.parse_timestamp(&raw).ok_or_else(|| {
                CostError::invalid(format!("{} is not an ISO-8601 timestamp: {}", FIELD_COLLECTED_AT, raw))
            })?,
            Some(Value::Null) | None => clock.now(),
            Some(other) => {
                return Err(CostError::invalid(format!(
                    "{} must be a string, got {}",
                    FIELD_COLLECTED_AT, other
                )))
            }
        };

        fields.remove(FIELD_WEEKLY_TOTAL);
        fields.remove(FIELD_LEGACY_WEEKLY);
        fields.remove(FIELD_SCRAPE_ERROR);

        Ok(Self {
            daily_cost_total,
            collected_at,
            balance,
            extra: fields,
        })
    }

    /// Wire form accepted by the ingestion endpoint.
    pub fn to_payload(&self) -> Value {
        let mut fields = self.extra.clone();
        fields.insert(FIELD_DAILY_COST.into(), Value::from(self.daily_cost_total));
        if let Some(balance) = self.balance {
            fields.insert(FIELD_BALANCE.into(), Value::from(balance));
        }
        fields.insert(
            FIELD_COLLECTED_AT.into(),
            Value::from(self.collected_at.to_rfc3339()),
        );
        Value::Object(fields)
    }
}

/// Parse a console money figure such as `R$ 5.665,28` into `5665.28`.
///
/// The console uses `.` for thousands and `,` for decimals and shows `—`
/// when a cell is empty. Plain numbers (`12.50`) are accepted as well.
pub fn parse_currency(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "—" {
        return None;
    }
    let negative = raw.starts_with('-');
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let normalized = if kept.contains(',') {
        kept.replace('.', "").replace(',', ".")
    } else if kept.matches('.').count() > 1 {
        kept.replace('.', "")
    } else {
        kept
    };
    let value: f64 = normalized.parse().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::parse_offset;
    use serde_json::json;

    fn clock() -> ZoneClock {
        ZoneClock::new(parse_offset("-03:00"))
    }

    #[test]
    fn minimal_payload_defaults_time_and_balance() {
        let sample = DailySample::from_payload(json!({"custo_diario_total": 7.5}), &clock()).unwrap();
        assert_eq!(sample.daily_cost_total, 7.5);
        assert_eq!(sample.balance, None);
        assert_eq!(sample.collected_at.offset().local_minus_utc(), -3 * 3600);
        assert!(sample.extra.is_empty());
    }

    #[test]
    fn full_payload_keeps_pass_through_fields() {
        let sample = DailySample::from_payload(
            json!({
                "custo_diario_total": 12.0,
                "saldo_atual": 5665.28,
                "data_coleta": "2024-06-05T15:00:00",
                "custo_diario_discador": 9.5,
                "custo_diario_ura": 2.5,
                "custo_semanal_acumulado": 0.0,
                "custo_semanal": 0.0
            }),
            &clock(),
        )
        .unwrap();
        assert_eq!(sample.balance, Some(5665.28));
        assert_eq!(sample.collected_at.to_rfc3339(), "2024-06-05T15:00:00-03:00");
        assert_eq!(sample.extra.len(), 2);
        assert!(sample.extra.contains_key("custo_diario_discador"));
        assert!(!sample.extra.contains_key("custo_semanal_acumulado"));
    }

    #[test]
    fn null_balance_is_absent_not_zero() {
        let sample =
            DailySample::from_payload(json!({"custo_diario_total": 1, "saldo_atual": null}), &clock())
                .unwrap();
        assert_eq!(sample.balance, None);
    }

    #[test]
    fn rejects_missing_daily_cost() {
        let err = DailySample::from_payload(json!({"saldo_atual": 10.0}), &clock()).unwrap_err();
        assert!(matches!(err, CostError::InvalidSample(_)));
    }

    #[test]
    fn rejects_non_numeric_daily_cost() {
        let err =
            DailySample::from_payload(json!({"custo_diario_total": "R$ 12,00"}), &clock()).unwrap_err();
        assert!(err.to_string().contains("must be a number"));
    }

    #[test]
    fn rejects_negative_daily_cost() {
        let err = DailySample::from_payload(json!({"custo_diario_total": -0.01}), &clock()).unwrap_err();
        assert!(err.to_string().contains(">= 0"));
    }

    #[test]
    fn rejects_daily_cost_above_cap() {
        let err = DailySample::from_payload(json!({"custo_diario_total": 1e307}), &clock()).unwrap_err();
        assert!(matches!(err, CostError::InvalidSample(_)));
        assert!(err.to_string().contains("<="));
        assert!(DailySample::from_payload(json!({"custo_diario_total": MAX_DAILY_COST}), &clock()).is_ok());
    }

    #[test]
    fn rejects_scraper_error_payload() {
        let err = DailySample::from_payload(
            json!({"erro": "Timeout durante o scraping.", "custo_diario_total": 0.0}),
            &clock(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Timeout"));
    }

    #[test]
    fn rejects_non_object_and_bad_timestamp() {
        assert!(DailySample::from_payload(json!([1, 2]), &clock()).is_err());
        assert!(DailySample::from_payload(
            json!({"custo_diario_total": 1.0, "data_coleta": "ontem"}),
            &clock()
        )
        .is_err());
    }

    #[test]
    fn payload_round_trip_preserves_fields() {
        let first = DailySample::from_payload(
            json!({"custo_diario_total": 3.25, "saldo_atual": 10.0, "custo_diario_ura": 1.0}),
            &clock(),
        )
        .unwrap();
        let again = DailySample::from_payload(first.to_payload(), &clock()).unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn parse_currency_console_formats() {
        assert_eq!(parse_currency("R$ 5.665,28"), Some(5665.28));
        assert_eq!(parse_currency("R$ 0,90"), Some(0.9));
        assert_eq!(parse_currency("12.50"), Some(12.5));
        assert_eq!(parse_currency("1.234.567"), Some(1234567.0));
        assert_eq!(parse_currency("-R$ 3,00"), Some(-3.0));
        assert_eq!(parse_currency("—"), None);
        assert_eq!(parse_currency("R$"), None);
        assert_eq!(parse_currency(""), None);
    }
}

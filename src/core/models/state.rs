use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Persisted accumulator state. One instance per deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyCostState {
    /// Sum of completed-day totals since the last Monday reset.
    #[serde(default)]
    pub accumulated_prior_days: f64,
    /// Most recent daily counter observed.
    #[serde(default)]
    pub last_daily_cost_seen: f64,
    /// Weekday of the last processed sample; `None` until the first one.
    #[serde(default)]
    pub last_sample_weekday: Option<Weekday>,
    /// Bumped on every applied sample; used to detect lost updates.
    #[serde(default)]
    pub revision: u64,
}

impl WeeklyCostState {
    pub fn weekly_total(&self) -> f64 {
        self.accumulated_prior_days + self.last_daily_cost_seen
    }

    /// Check the non-negativity invariants. Returns a description of the first
    /// violation found.
    pub fn violation(&self) -> Option<String> {
        if !self.accumulated_prior_days.is_finite() || self.accumulated_prior_days < 0.0 {
            return Some(format!(
                "accumulated_prior_days must be >= 0, got {}",
                self.accumulated_prior_days
            ));
        }
        if !self.last_daily_cost_seen.is_finite() || self.last_daily_cost_seen < 0.0 {
            return Some(format!(
                "last_daily_cost_seen must be >= 0, got {}",
                self.last_daily_cost_seen
            ));
        }
        None
    }
}

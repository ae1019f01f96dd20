//! Weekly cost accumulation.
//!
//! The dialer only exposes a "cost so far today" counter that silently drops
//! back to zero at some point each day. The weekly figure is rebuilt from that
//! counter alone:
//!
//! 1. The first sample taken on a Monday empties the weekly bucket.
//! 2. Otherwise, a counter lower than the last one seen means the day rolled
//!    over, so the last value seen is folded into the bucket.
//! 3. `weekly_total = bucket + today's counter`.
//!
//! Known accuracy bound: a gap spanning more than one rollover loses the
//! intermediate days, and a rollover with no lower reading afterwards (e.g. the
//! next sample is already higher than yesterday's last one) goes unnoticed.
//! Both undercount.

use chrono::{Datelike, Weekday};

use crate::core::models::round_cents;
use crate::core::models::sample::DailySample;
use crate::core::models::snapshot::WeeklySnapshot;
use crate::core::models::state::WeeklyCostState;

/// Which rule fired for a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// First sample of the week; the bucket was emptied.
    WeekReset,
    /// The daily counter went down; the previous day's last reading was folded in.
    Rollover { folded: f64 },
    /// Same day, counter unchanged or growing.
    SameDay,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub state: WeeklyCostState,
    pub snapshot: WeeklySnapshot,
    pub transition: Transition,
}

/// Compute the next state and the snapshot to publish.
///
/// The sample's `collected_at` is the reference instant; its weekday is taken
/// in whatever offset the timestamp carries.
pub fn apply(state: &WeeklyCostState, sample: &DailySample) -> Applied {
    let today = sample.collected_at.weekday();
    let daily = round_cents(sample.daily_cost_total);

    let new_week = today == Weekday::Mon && state.last_sample_weekday != Some(Weekday::Mon);

    let (accumulated, transition) = if new_week {
        (0.0, Transition::WeekReset)
    } else if daily < state.last_daily_cost_seen {
        let folded = state.last_daily_cost_seen;
        (
            round_cents(state.accumulated_prior_days + folded),
            Transition::Rollover { folded },
        )
    } else {
        (state.accumulated_prior_days, Transition::SameDay)
    };

    let next = WeeklyCostState {
        accumulated_prior_days: accumulated,
        last_daily_cost_seen: daily,
        last_sample_weekday: Some(today),
        revision: state.revision + 1,
    };
    assert!(
        next.violation().is_none(),
        "accumulator produced an invalid state: {:?}",
        next
    );

    let snapshot = WeeklySnapshot {
        balance: sample.balance,
        daily_cost_total: daily,
        weekly_total: round_cents(next.weekly_total()),
        collected_at: sample.collected_at,
        extra: sample.extra.clone(),
    };

    Applied {
        state: next,
        snapshot,
        transition,
    }
}

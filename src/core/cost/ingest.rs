use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::core::clock::ZoneClock;
use crate::core::cost::accumulator::{self, Transition};
use crate::core::cost::store::StateStore;
use crate::core::error::CostError;
use crate::core::formatter::{self, FormattedSnapshot};
use crate::core::models::sample::{check_daily_cost, DailySample};
use crate::core::models::snapshot::WeeklySnapshot;
use crate::core::models::state::WeeklyCostState;

/// Attempts at load/apply/save before a revision conflict is surfaced.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// Entry point for samples and dashboard reads.
///
/// Ingestions are serialized by an in-process lock; the store's revision
/// check catches writers outside this process.
pub struct IngestionService {
    store: Arc<dyn StateStore>,
    clock: ZoneClock,
    write_lock: Mutex<()>,
}

impl IngestionService {
    pub fn new(store: Arc<dyn StateStore>, clock: ZoneClock) -> Self {
        Self {
            store,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn clock(&self) -> &ZoneClock {
        &self.clock
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    /// Validate a raw ingestion payload and apply it.
    pub fn receive_payload(&self, payload: Value) -> Result<WeeklySnapshot, CostError> {
        let sample = DailySample::from_payload(payload, &self.clock)?;
        self.receive(sample)
    }

    /// Apply one sample and persist the result.
    pub fn receive(&self, mut sample: DailySample) -> Result<WeeklySnapshot, CostError> {
        check_daily_cost(sample.daily_cost_total)?;
        sample.collected_at = self.clock.localize(sample.collected_at);

        // Nothing inside the critical section can leave shared data half
        // written, so a poisoned lock is safe to reuse.
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut attempt = 1;
        loop {
            let state = self.store.load()?;
            // A late or replayed sample would be judged against a weekday that
            // already passed and could empty the bucket mid-week.
            if let Some(latest) = self.store.read_snapshot()? {
                if sample.collected_at < latest.collected_at {
                    return Err(CostError::invalid(format!(
                        "sample collected at {} is older than the latest one ({})",
                        sample.collected_at.to_rfc3339(),
                        latest.collected_at.to_rfc3339()
                    )));
                }
            }
            let applied = accumulator::apply(&state, &sample);
            match self.store.save(state.revision, &applied.state, &applied.snapshot) {
                Ok(()) => {
                    log_transition(&applied.transition, &applied.snapshot);
                    return Ok(applied.snapshot);
                }
                Err(CostError::ConcurrentWriteConflict { expected, found })
                    if attempt < MAX_WRITE_ATTEMPTS =>
                {
                    tracing::warn!(
                        attempt,
                        expected,
                        found,
                        store = %self.store.describe(),
                        "state changed underneath ingestion, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Latest snapshot, or `None` before the first ingestion.
    pub fn latest(&self) -> Result<Option<WeeklySnapshot>, CostError> {
        self.store.read_snapshot()
    }

    /// Dashboard view. Before the first ingestion this is the pending
    /// sentinel; a broken store is an error, never a sentinel.
    pub fn query(&self) -> Result<FormattedSnapshot, CostError> {
        Ok(match self.store.read_snapshot()? {
            Some(snapshot) => formatter::format_snapshot(&snapshot),
            None => formatter::pending(self.clock.now()),
        })
    }

    pub fn state(&self) -> Result<WeeklyCostState, CostError> {
        self.store.load()
    }

    /// Operator reset. Takes the write lock so it cannot interleave with an
    /// ingestion.
    pub fn clear(&self) -> Result<(), CostError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.store.clear()?;
        tracing::info!(store = %self.store.describe(), "weekly cost state cleared");
        Ok(())
    }
}

fn log_transition(transition: &Transition, snapshot: &WeeklySnapshot) {
    match transition {
        Transition::WeekReset => tracing::info!(
            daily = snapshot.daily_cost_total,
            weekly = snapshot.weekly_total,
            "new week started, weekly bucket reset"
        ),
        Transition::Rollover { folded } => tracing::info!(
            folded,
            daily = snapshot.daily_cost_total,
            weekly = snapshot.weekly_total,
            "daily counter rolled over"
        ),
        Transition::SameDay => tracing::debug!(
            daily = snapshot.daily_cost_total,
            weekly = snapshot.weekly_total,
            "sample applied"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::parse_offset;
    use crate::core::cost::store::{FileStore, MemoryStore};
    use crate::core::formatter::PENDING;
    use chrono::{DateTime, FixedOffset};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn clock() -> ZoneClock {
        ZoneClock::new(parse_offset("-03:00"))
    }

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    fn memory_service() -> IngestionService {
        IngestionService::new(Arc::new(MemoryStore::default()), clock())
    }

    #[test]
    fn query_before_any_ingestion_is_pending() {
        let out = memory_service().query().unwrap();
        assert_eq!(out.saldo_atual, PENDING);
        assert_eq!(out.custo_diario, PENDING);
        assert_eq!(out.custo_semanal, PENDING);
    }

    #[test]
    fn receive_then_query() {
        let service = memory_service();
        let snapshot = service
            .receive_payload(json!({
                "custo_diario_total": 7.5,
                "saldo_atual": 5665.28,
                "data_coleta": "2024-06-05T15:00:00-03:00"
            }))
            .unwrap();
        assert_eq!(snapshot.weekly_total, 7.5);

        let out = service.query().unwrap();
        assert_eq!(out.custo_semanal, "R$ 7,50");
        assert_eq!(out.saldo_atual, "R$ 5665,28");
        assert_eq!(service.state().unwrap().revision, 1);
    }

    #[test]
    fn invalid_sample_does_not_touch_state() {
        let service = memory_service();
        service
            .receive(DailySample::new(10.0, at("2024-06-05T15:00:00-03:00")))
            .unwrap();
        let before = service.state().unwrap();

        let err = service
            .receive_payload(json!({"saldo_atual": 1.0}))
            .unwrap_err();
        assert!(matches!(err, CostError::InvalidSample(_)));
        let err = service
            .receive(DailySample::new(-1.0, at("2024-06-05T16:00:00-03:00")))
            .unwrap_err();
        assert!(matches!(err, CostError::InvalidSample(_)));
        assert_eq!(service.state().unwrap(), before);
    }

    #[test]
    fn late_monday_sample_is_rejected() {
        let service = memory_service();
        let plan = [
            ("2024-06-03T15:00:00-03:00", 12.0, 12.0),
            ("2024-06-04T10:00:00-03:00", 5.0, 17.0),
            ("2024-06-04T15:00:00-03:00", 30.0, 42.0),
        ];
        for (when, daily, weekly) in plan {
            let snapshot = service.receive(DailySample::new(daily, at(when))).unwrap();
            assert_eq!(snapshot.weekly_total, weekly, "at {}", when);
        }
        let before = service.state().unwrap();

        let err = service
            .receive(DailySample::new(20.0, at("2024-06-03T18:00:00-03:00")))
            .unwrap_err();
        assert!(matches!(err, CostError::InvalidSample(_)));
        assert_eq!(service.state().unwrap(), before);
        assert_eq!(service.query().unwrap().custo_semanal, "R$ 42,00");

        // Same instant as the latest sample is still accepted.
        let snapshot = service
            .receive(DailySample::new(30.0, at("2024-06-04T15:00:00-03:00")))
            .unwrap();
        assert_eq!(snapshot.weekly_total, 42.0);
    }

    #[test]
    fn oversized_daily_cost_is_invalid_not_a_panic() {
        let service = memory_service();
        let err = service
            .receive_payload(json!({"custo_diario_total": 1e307}))
            .unwrap_err();
        assert!(matches!(err, CostError::InvalidSample(_)));
        let err = service
            .receive(DailySample::new(1e307, at("2024-06-05T15:00:00-03:00")))
            .unwrap_err();
        assert!(matches!(err, CostError::InvalidSample(_)));
        assert_eq!(service.state().unwrap(), WeeklyCostState::default());
    }

    #[test]
    fn timestamps_are_judged_in_operator_offset() {
        let service = memory_service();
        // Sunday 23:00 in Sao Paulo is Monday 02:00 UTC; must not reset.
        service
            .receive(DailySample::new(50.0, at("2024-06-08T18:00:00-03:00")))
            .unwrap();
        let snapshot = service
            .receive(DailySample::new(60.0, at("2024-06-10T02:00:00+00:00")))
            .unwrap();
        assert_eq!(snapshot.weekly_total, 60.0);
        assert_eq!(snapshot.collected_at.to_rfc3339(), "2024-06-09T23:00:00-03:00");
        assert_eq!(service.state().unwrap().last_sample_weekday, Some(chrono::Weekday::Sun));
    }

    #[test]
    fn week_of_ingestions_through_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let service = IngestionService::new(Arc::new(FileStore::new(&path)), clock());
        let plan = [
            ("2024-06-03T15:00:00-03:00", 12.0, 12.0),
            ("2024-06-03T18:30:00-03:00", 20.0, 20.0),
            ("2024-06-04T15:00:00-03:00", 5.0, 25.0),
            ("2024-06-04T18:30:00-03:00", 9.0, 29.0),
        ];
        for (when, daily, weekly) in plan {
            let snapshot = service.receive(DailySample::new(daily, at(when))).unwrap();
            assert_eq!(snapshot.weekly_total, weekly, "at {}", when);
        }

        // A new process picks up where the last one stopped.
        let restarted = IngestionService::new(Arc::new(FileStore::new(&path)), clock());
        assert_eq!(restarted.state().unwrap().accumulated_prior_days, 20.0);
        assert_eq!(restarted.query().unwrap().custo_semanal, "R$ 29,00");
    }

    #[test]
    fn clear_returns_to_pending() {
        let service = memory_service();
        service
            .receive(DailySample::new(3.0, at("2024-06-05T15:00:00-03:00")))
            .unwrap();
        service.clear().unwrap();
        assert_eq!(service.state().unwrap(), WeeklyCostState::default());
        assert_eq!(service.query().unwrap().custo_diario, PENDING);
    }

    #[test]
    fn broken_store_is_an_error_not_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "garbage").unwrap();
        let service = IngestionService::new(Arc::new(FileStore::new(&path)), clock());
        assert!(service.query().unwrap_err().is_unavailable());
        let err = service
            .receive(DailySample::new(1.0, at("2024-06-05T15:00:00-03:00")))
            .unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");
    }

    #[test]
    fn concurrent_ingestions_lose_no_update() {
        let service = Arc::new(memory_service());
        let threads = 16;
        let handles: Vec<_> = (1..=threads)
            .map(|i| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    service
                        .receive(DailySample::new(i as f64, at("2024-06-05T15:00:00-03:00")))
                        .unwrap()
                })
            })
            .collect();
        let snapshots: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let state = service.state().unwrap();
        assert_eq!(state.revision, threads as u64);
        // The last committed snapshot is the one the store holds.
        let latest = service.latest().unwrap().unwrap();
        assert_eq!(state.last_daily_cost_seen, latest.daily_cost_total);
        assert!(snapshots.iter().any(|s| *s == latest));
    }

    /// Store that reports a conflict a fixed number of times before
    /// delegating, standing in for a second writer process.
    struct ContendedStore {
        inner: MemoryStore,
        conflicts_left: AtomicUsize,
    }

    impl StateStore for ContendedStore {
        fn load(&self) -> Result<WeeklyCostState, CostError> {
            self.inner.load()
        }
        fn save(
            &self,
            expected_revision: u64,
            state: &WeeklyCostState,
            snapshot: &WeeklySnapshot,
        ) -> Result<(), CostError> {
            if self
                .conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CostError::ConcurrentWriteConflict {
                    expected: expected_revision,
                    found: expected_revision + 1,
                });
            }
            self.inner.save(expected_revision, state, snapshot)
        }
        fn read_snapshot(&self) -> Result<Option<WeeklySnapshot>, CostError> {
            self.inner.read_snapshot()
        }
        fn clear(&self) -> Result<(), CostError> {
            self.inner.clear()
        }
        fn describe(&self) -> String {
            "contended".to_string()
        }
    }

    fn contended(conflicts: usize) -> IngestionService {
        let store = ContendedStore {
            inner: MemoryStore::default(),
            conflicts_left: AtomicUsize::new(conflicts),
        };
        IngestionService::new(Arc::new(store), clock())
    }

    #[test]
    fn conflicts_are_retried() {
        let service = contended(MAX_WRITE_ATTEMPTS - 1);
        let snapshot = service
            .receive(DailySample::new(4.0, at("2024-06-05T15:00:00-03:00")))
            .unwrap();
        assert_eq!(snapshot.weekly_total, 4.0);
    }

    #[test]
    fn persistent_conflict_is_surfaced() {
        let service = contended(MAX_WRITE_ATTEMPTS);
        let err = service
            .receive(DailySample::new(4.0, at("2024-06-05T15:00:00-03:00")))
            .unwrap_err();
        assert!(matches!(err, CostError::ConcurrentWriteConflict { .. }));
        assert!(service.latest().unwrap().is_none());
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::aggregation::{build_matrix, RealizationMatrix};
use crate::cache::{CacheState, RealizationCache};
use crate::domain::{BusinessUnit, Month, RealizationRecord};
use crate::goals::{GoalBook, PerformanceSummary};
use crate::store::{RealizationStore, StoreError};

/// Retry budget for reads. Writes are never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self { retries: 2, backoff: Duration::from_millis(200) }
    }
}

impl FetchPolicy {
    /// Doubling delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

pub struct RealizationService {
    store: Arc<dyn RealizationStore>,
    cache: RealizationCache,
    policy: FetchPolicy,
}

impl RealizationService {
    pub fn new(
        store: Arc<dyn RealizationStore>,
        cache: RealizationCache,
        policy: FetchPolicy,
    ) -> Self {
        Self { store, cache, policy }
    }

    pub fn cache_state(&self, year: i32) -> CacheState {
        self.cache.state(year, Utc::now())
    }

    /// Matrix from the last successful fetch, even when it is stale.
    pub fn last_known_good(&self, year: i32) -> Option<Arc<RealizationMatrix>> {
        self.cache.last_known_good(year)
    }

    /// Aggregated matrix for `year`, served from cache while fresh.
    ///
    /// Store errors are returned unchanged; the previous matrix stays
    /// available through [`Self::last_known_good`].
    pub async fn matrix(&self, year: i32) -> Result<Arc<RealizationMatrix>, StoreError> {
        if let Some(matrix) = self.cache.get_fresh(year, Utc::now()) {
            debug!(event_name = "realization.cache.hit", year, "serving cached realization matrix");
            return Ok(matrix);
        }

        let ticket = self.cache.begin_fetch(year);
        let records = match self.fetch_with_retry(year).await {
            Ok(records) => records,
            Err(error) => {
                self.cache.fail_fetch(ticket);
                warn!(
                    event_name = "realization.fetch.failed",
                    year,
                    error = %error,
                    "realization refresh failed"
                );
                return Err(error);
            }
        };

        let matrix = Arc::new(build_matrix(&records, year));
        if self.cache.complete_fetch(ticket, Arc::clone(&matrix), Utc::now()) {
            debug!(
                event_name = "realization.cache.filled",
                year,
                records = records.len(),
                "realization matrix rebuilt"
            );
        } else {
            debug!(
                event_name = "realization.cache.discarded",
                year,
                "fetch superseded before commit, result not cached"
            );
        }
        Ok(matrix)
    }

    pub async fn performance(
        &self,
        year: i32,
        goals: &GoalBook,
    ) -> Result<PerformanceSummary, StoreError> {
        let matrix = self.matrix(year).await?;
        Ok(PerformanceSummary::compute(&matrix, goals))
    }

    /// Writes one cell and invalidates the cached year on success.
    pub async fn upsert_cell(
        &self,
        bu: BusinessUnit,
        month: Month,
        year: i32,
        value: Decimal,
    ) -> Result<RealizationRecord, StoreError> {
        let record = self.store.upsert_cell(bu, month, year, value).await.map_err(|error| {
            warn!(
                event_name = "realization.upsert.failed",
                bu = %bu,
                month = %month,
                year,
                error = %error,
                "realization upsert rejected"
            );
            error
        })?;

        self.cache.invalidate(year);
        info!(
            event_name = "realization.upsert.applied",
            bu = %bu,
            month = %month,
            year,
            value = %record.value,
            "realization cell updated"
        );
        Ok(record)
    }

    async fn fetch_with_retry(&self, year: i32) -> Result<Vec<RealizationRecord>, StoreError> {
        let mut attempt = 0;
        loop {
            match self.store.fetch_all(year).await {
                Ok(records) => return Ok(records),
                Err(error) if error.is_transient() && attempt < self.policy.retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        event_name = "realization.fetch.retry",
                        year,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying realization fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::{FetchPolicy, RealizationService};
    use crate::cache::{CacheState, RealizationCache};
    use crate::domain::{BusinessUnit, CellKey, Month, RealizationRecord};
    use crate::goals::{GoalBook, GoalSet};
    use crate::store::{check_cell_constraints, RealizationStore, StoreError};

    /// Map-backed store whose next calls can be scripted to fail.
    #[derive(Default)]
    struct ScriptedStore {
        rows: Mutex<BTreeMap<CellKey, RealizationRecord>>,
        fetch_failures: Mutex<VecDeque<StoreError>>,
        upsert_failures: Mutex<VecDeque<StoreError>>,
        fetches: AtomicUsize,
        upserts: AtomicUsize,
    }

    impl ScriptedStore {
        fn fail_next_fetches(&self, errors: Vec<StoreError>) {
            self.fetch_failures.lock().expect("lock").extend(errors);
        }

        fn fail_next_upsert(&self, error: StoreError) {
            self.upsert_failures.lock().expect("lock").push_back(error);
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn upsert_count(&self) -> usize {
            self.upserts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RealizationStore for ScriptedStore {
        async fn fetch_all(&self, year: i32) -> Result<Vec<RealizationRecord>, StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.fetch_failures.lock().expect("lock").pop_front() {
                return Err(error);
            }
            let rows = self.rows.lock().expect("lock");
            Ok(rows.values().filter(|record| record.year == year).cloned().collect())
        }

        async fn upsert_cell(
            &self,
            bu: BusinessUnit,
            month: Month,
            year: i32,
            value: Decimal,
        ) -> Result<RealizationRecord, StoreError> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.upsert_failures.lock().expect("lock").pop_front() {
                return Err(error);
            }
            check_cell_constraints(year, value)?;
            let mut rows = self.rows.lock().expect("lock");
            let record = rows
                .entry(CellKey::new(bu, month, year))
                .and_modify(|record| record.value = value)
                .or_insert_with(|| RealizationRecord::new(bu, month, year, value))
                .clone();
            Ok(record)
        }
    }

    fn service_with(store: Arc<ScriptedStore>, freshness_secs: i64) -> RealizationService {
        RealizationService::new(
            store,
            RealizationCache::new(chrono::Duration::seconds(freshness_secs)),
            FetchPolicy { retries: 2, backoff: Duration::ZERO },
        )
    }

    fn dec(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    #[tokio::test]
    async fn fresh_matrix_is_served_from_cache() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(Arc::clone(&store), 300);

        service.matrix(2026).await.expect("first read");
        service.matrix(2026).await.expect("second read");

        assert_eq!(store.fetch_count(), 1);
        assert_eq!(service.cache_state(2026), CacheState::Fresh);
    }

    #[tokio::test]
    async fn upsert_invalidates_and_next_read_sees_the_write() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(Arc::clone(&store), 300);

        let before = service.matrix(2026).await.expect("initial read");
        assert_eq!(before.value(BusinessUnit::O2Tax, Month::Mar), Decimal::ZERO);

        service.upsert_cell(BusinessUnit::O2Tax, Month::Mar, 2026, dec(200)).await.expect("write");
        assert_eq!(service.cache_state(2026), CacheState::Stale);
        service.upsert_cell(BusinessUnit::O2Tax, Month::Mar, 2026, dec(350)).await.expect("write");

        let after = service.matrix(2026).await.expect("read after write");
        assert_eq!(after.value(BusinessUnit::O2Tax, Month::Mar), dec(350));
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn upsert_only_invalidates_its_own_year() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(Arc::clone(&store), 300);

        service.matrix(2025).await.expect("read 2025");
        service
            .upsert_cell(BusinessUnit::Franquia, Month::Jan, 2026, dec(10))
            .await
            .expect("write");

        assert_eq!(service.cache_state(2025), CacheState::Fresh);
    }

    #[tokio::test]
    async fn transient_fetch_failures_are_retried() {
        let store = Arc::new(ScriptedStore::default());
        store.fail_next_fetches(vec![
            StoreError::Unavailable("timeout".to_string()),
            StoreError::Unavailable("timeout".to_string()),
        ]);
        let service = service_with(Arc::clone(&store), 300);

        service.matrix(2026).await.expect("third attempt succeeds");
        assert_eq!(store.fetch_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_original_error() {
        let store = Arc::new(ScriptedStore::default());
        store.fail_next_fetches(vec![
            StoreError::Unavailable("down".to_string()),
            StoreError::Unavailable("down".to_string()),
            StoreError::Unavailable("still down".to_string()),
        ]);
        let service = service_with(Arc::clone(&store), 300);

        let error = service.matrix(2026).await.expect_err("retries exhausted");
        assert_eq!(error, StoreError::Unavailable("still down".to_string()));
        assert_eq!(store.fetch_count(), 3);
        assert_eq!(service.cache_state(2026), CacheState::Stale);
    }

    #[tokio::test]
    async fn constraint_violations_on_fetch_are_not_retried() {
        let store = Arc::new(ScriptedStore::default());
        store.fail_next_fetches(vec![StoreError::ConstraintViolation("bad year".to_string())]);
        let service = service_with(Arc::clone(&store), 300);

        let error = service.matrix(2026).await.expect_err("constraint violation");
        assert!(matches!(error, StoreError::ConstraintViolation(_)));
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn corrupt_records_on_fetch_are_not_retried() {
        let store = Arc::new(ScriptedStore::default());
        store.fail_next_fetches(vec![
            StoreError::CorruptRecord("could not decode realization.value".to_string()),
            StoreError::CorruptRecord("could not decode realization.value".to_string()),
        ]);
        let service = service_with(Arc::clone(&store), 300);

        let error = service.matrix(2026).await.expect_err("corrupt row");
        assert!(matches!(error, StoreError::CorruptRecord(_)));
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(service.cache_state(2026), CacheState::Stale);
    }

    #[tokio::test]
    async fn failed_upsert_is_not_retried_and_keeps_cache_fresh() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(Arc::clone(&store), 300);
        service.matrix(2026).await.expect("initial read");

        store.fail_next_upsert(StoreError::Unavailable("network".to_string()));
        let error = service
            .upsert_cell(BusinessUnit::OxyHacker, Month::Mai, 2026, dec(5))
            .await
            .expect_err("upsert fails");

        assert!(matches!(error, StoreError::Unavailable(_)));
        assert_eq!(store.upsert_count(), 1);
        assert_eq!(service.cache_state(2026), CacheState::Fresh);
    }

    #[tokio::test]
    async fn rejected_value_surfaces_constraint_violation() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(Arc::clone(&store), 300);

        let error = service
            .upsert_cell(BusinessUnit::OxyHacker, Month::Mai, 2026, dec(-5))
            .await
            .expect_err("negative value");
        assert!(matches!(error, StoreError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_known_good_matrix() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(Arc::clone(&store), 300);
        service
            .upsert_cell(BusinessUnit::ModeloAtual, Month::Jan, 2026, dec(1000))
            .await
            .expect("write");
        service.matrix(2026).await.expect("good read");

        service
            .upsert_cell(BusinessUnit::ModeloAtual, Month::Fev, 2026, dec(500))
            .await
            .expect("write");
        store.fail_next_fetches(vec![
            StoreError::Unavailable("down".to_string()),
            StoreError::Unavailable("down".to_string()),
            StoreError::Unavailable("down".to_string()),
        ]);
        service.matrix(2026).await.expect_err("refresh fails");

        let kept = service.last_known_good(2026).expect("previous matrix kept");
        assert_eq!(kept.total_for(BusinessUnit::ModeloAtual), dec(1000));
    }

    #[tokio::test]
    async fn expired_window_triggers_refetch() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(Arc::clone(&store), 0);

        service.matrix(2026).await.expect("first read");
        service.matrix(2026).await.expect("second read");

        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn performance_reconciles_totals_against_goals() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(Arc::clone(&store), 300);
        service
            .upsert_cell(BusinessUnit::ModeloAtual, Month::Jan, 2026, dec(1000))
            .await
            .expect("write");
        service
            .upsert_cell(BusinessUnit::ModeloAtual, Month::Fev, 2026, dec(500))
            .await
            .expect("write");
        let goals = GoalBook::new().with(BusinessUnit::ModeloAtual, GoalSet::annual(dec(3000)));

        let summary = service.performance(2026, &goals).await.expect("performance");
        let modelo = summary.for_bu(BusinessUnit::ModeloAtual).expect("modelo_atual present");

        assert_eq!(modelo.attainment.realized, dec(1500));
        assert_eq!(modelo.attainment.percentage, dec(50));
        assert!(!modelo.attainment.is_above_goal);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = FetchPolicy { retries: 3, backoff: Duration::from_millis(100) };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }
}

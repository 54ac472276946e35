//! Refresh coordination for cached queries.
//!
//! [`RefreshCoordinator::get_or_refresh`] decides per request whether a
//! query's snapshot is stale and, if so, whether this caller gets to
//! refetch it. At most one fetch per query is in flight at any time.
//! Callers that lose the race are handed the stale snapshot immediately,
//! so a slow data source never blocks a read.

use std::sync::Arc;

use querydeck_types::Snapshot;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::CacheError;
use crate::executor::DataSourceExecutor;
use crate::query::QueryDefinition;

/// Result of a [`RefreshCoordinator::get_or_refresh`] call.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// The best available snapshot.
    pub snapshot: Arc<Snapshot>,
    /// Generation of `snapshot` in the query's cache entry.
    pub generation: u64,
    /// Whether this call fetched `snapshot` itself.
    pub refreshed: bool,
}

/// Serves cached snapshots and refetches them when their TTL runs out.
pub struct RefreshCoordinator {
    executor: Arc<dyn DataSourceExecutor>,
    clock: Arc<dyn Clock>,
}

impl RefreshCoordinator {
    /// Create a coordinator that fetches through `executor` and reads the
    /// system clock.
    pub fn new(executor: Arc<dyn DataSourceExecutor>) -> Self {
        Self::with_clock(executor, Arc::new(SystemClock))
    }

    /// Create a coordinator with an explicit time source.
    pub fn with_clock(executor: Arc<dyn DataSourceExecutor>, clock: Arc<dyn Clock>) -> Self {
        Self { executor, clock }
    }

    /// Return the query's snapshot, refetching it first if it is stale and
    /// no other refresh is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Fetch`] if this caller won the refresh and the
    /// data source failed, or [`CacheError::NotFound`] if the query's data
    /// source is not registered. In both cases the previously stored
    /// snapshot and refresh time are left untouched and the gate is
    /// reopened.
    pub async fn get_or_refresh(&self, query: &QueryDefinition) -> Result<RefreshOutcome, CacheError> {
        let now = self.clock.now();

        if !query.cache.is_stale_at(now, query.refresh_interval_secs) {
            let cached = query.cache.current();
            debug!(query = %query.name, generation = cached.generation, "serving cached snapshot");
            return Ok(RefreshOutcome {
                snapshot: cached.snapshot,
                generation: cached.generation,
                refreshed: false,
            });
        }

        let Some(guard) = query
            .cache
            .begin_refresh_if_stale(now, query.refresh_interval_secs)
        else {
            let cached = query.cache.current();
            debug!(
                query = %query.name,
                generation = cached.generation,
                "refresh already in flight or just finished, serving cached snapshot"
            );
            return Ok(RefreshOutcome {
                snapshot: cached.snapshot,
                generation: cached.generation,
                refreshed: false,
            });
        };

        let result = self
            .executor
            .execute(&query.database_name, &query.query_string)
            .await;

        let result_set = match result {
            Ok(rs) => rs,
            Err(e) => {
                warn!(query = %query.name, database = %query.database_name, error = %e, "refresh failed");
                return Err(CacheError::from_execute(&query.name, e));
            }
        };

        let (snapshot, reshaped) = Snapshot::from_fetched(
            &query.name,
            query.column_list.clone(),
            query.row_list.clone(),
            result_set.rows,
            self.clock.now(),
        );
        if reshaped > 0 {
            warn!(
                query = %query.name,
                reshaped,
                columns = query.column_list.len(),
                "fetched rows did not match configured column count"
            );
        }
        let rows = snapshot.row_count();
        let stored = guard.store(snapshot, self.clock.now());
        drop(guard);

        info!(query = %query.name, rows, generation = stored.generation, "query refreshed");

        Ok(RefreshOutcome {
            snapshot: stored.snapshot,
            generation: stored.generation,
            refreshed: true,
        })
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;
    use querydeck_types::{CellValue, ResultSet};
    use tokio::sync::{Mutex, Notify};

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::QueryConfig;
    use crate::executor::ExecuteError;

    /// Executor that returns scripted results and counts calls.
    struct ScriptedExecutor {
        calls: AtomicUsize,
        responses: Mutex<Vec<Result<ResultSet, ExecuteError>>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedExecutor {
        fn new(responses: Vec<Result<ResultSet, ExecuteError>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses),
                gate: None,
            }
        }

        fn gated(responses: Vec<Result<ResultSet, ExecuteError>>, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(responses)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DataSourceExecutor for ScriptedExecutor {
        async fn execute(&self, source_name: &str, _query: &str) -> Result<ResultSet, ExecuteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                return Err(ExecuteError::Failed {
                    source_name: source_name.to_owned(),
                    message: "no scripted response".to_owned(),
                });
            }
            responses.remove(0)
        }
    }

    fn sales_rows(amounts: &[i64]) -> ResultSet {
        ResultSet {
            columns: vec!["region".to_owned(), "amount".to_owned()],
            rows: amounts
                .iter()
                .map(|a| vec![CellValue::from("east"), CellValue::Int(*a)])
                .collect(),
        }
    }

    fn sales_query(refresh_time: Option<u64>) -> QueryDefinition {
        QueryDefinition::from_config(QueryConfig {
            name: "sales".to_owned(),
            database_name: "warehouse".to_owned(),
            query_string: "SELECT region, amount FROM sales".to_owned(),
            refresh_time,
            column_list: vec!["region".to_owned(), "amount".to_owned()],
            row_list: Vec::new(),
        })
    }

    fn start() -> DateTime<chrono::Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn first_read_fetches_and_later_reads_hit_cache() {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(sales_rows(&[10, 20]))]));
        let clock = Arc::new(ManualClock::new(start()));
        let coordinator = RefreshCoordinator::with_clock(executor.clone(), clock.clone());
        let query = sales_query(Some(60));

        let first = coordinator.get_or_refresh(&query).await.unwrap();
        assert!(first.refreshed);
        assert_eq!(first.snapshot.row_count(), 2);
        assert_eq!(first.snapshot.title, "sales");

        clock.advance_secs(60);
        let second = coordinator.get_or_refresh(&query).await.unwrap();
        assert!(!second.refreshed);
        assert!(Arc::ptr_eq(&first.snapshot, &second.snapshot));
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn refetches_once_interval_is_exceeded() {
        let executor = Arc::new(ScriptedExecutor::new(vec![
            Ok(sales_rows(&[10])),
            Ok(sales_rows(&[10, 20, 30])),
        ]));
        let clock = Arc::new(ManualClock::new(start()));
        let coordinator = RefreshCoordinator::with_clock(executor.clone(), clock.clone());
        let query = sales_query(Some(60));

        coordinator.get_or_refresh(&query).await.unwrap();
        clock.advance_secs(61);
        let outcome = coordinator.get_or_refresh(&query).await.unwrap();
        assert!(outcome.refreshed);
        assert_eq!(outcome.generation, 2);
        assert_eq!(outcome.snapshot.row_count(), 3);
        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn refresh_once_query_is_fetched_a_single_time() {
        let executor = Arc::new(ScriptedExecutor::new(vec![Ok(sales_rows(&[1]))]));
        let clock = Arc::new(ManualClock::new(start()));
        let coordinator = RefreshCoordinator::with_clock(executor.clone(), clock.clone());
        let query = sales_query(None);

        coordinator.get_or_refresh(&query).await.unwrap();
        clock.advance_secs(1_000_000);
        let outcome = coordinator.get_or_refresh(&query).await.unwrap();
        assert!(!outcome.refreshed);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn fetch_error_preserves_snapshot_and_releases_gate() {
        let executor = Arc::new(ScriptedExecutor::new(vec![
            Ok(sales_rows(&[10])),
            Err(ExecuteError::Failed {
                source_name: "warehouse".to_owned(),
                message: "connection refused".to_owned(),
            }),
            Ok(sales_rows(&[10, 20])),
        ]));
        let clock = Arc::new(ManualClock::new(start()));
        let coordinator = RefreshCoordinator::with_clock(executor.clone(), clock.clone());
        let query = sales_query(Some(10));

        let first = coordinator.get_or_refresh(&query).await.unwrap();
        let refreshed_at = query.cache.last_refresh();

        clock.advance_secs(11);
        let err = coordinator.get_or_refresh(&query).await.unwrap_err();
        assert!(matches!(err, CacheError::Fetch { .. }));
        assert!(!query.cache.is_refreshing());
        assert_eq!(query.cache.last_refresh(), refreshed_at);
        assert!(Arc::ptr_eq(&query.cache.current().snapshot, &first.snapshot));

        // The gate is open again, so the next stale read refreshes.
        let retry = coordinator.get_or_refresh(&query).await.unwrap();
        assert!(retry.refreshed);
        assert_eq!(retry.snapshot.row_count(), 2);
    }

    #[tokio::test]
    async fn unknown_data_source_is_not_found() {
        let executor = Arc::new(ScriptedExecutor::new(vec![Err(ExecuteError::UnknownSource(
            "warehouse".to_owned(),
        ))]));
        let coordinator = RefreshCoordinator::new(executor);
        let query = sales_query(Some(10));

        let err = coordinator.get_or_refresh(&query).await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::NotFound { kind: crate::EntityKind::Database, .. }
        ));
        assert!(!query.cache.is_refreshing());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stale_reads_fetch_once() {
        let gate = Arc::new(Notify::new());
        let executor = Arc::new(ScriptedExecutor::gated(
            vec![Ok(sales_rows(&[10, 20, 30]))],
            Arc::clone(&gate),
        ));
        let coordinator = Arc::new(RefreshCoordinator::new(executor.clone()));
        let query = Arc::new(sales_query(Some(60)));

        let winner = {
            let coordinator = Arc::clone(&coordinator);
            let query = Arc::clone(&query);
            tokio::spawn(async move { coordinator.get_or_refresh(&query).await })
        };

        // Wait until the winner is parked inside the executor.
        while executor.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let losers = (0..16).map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let query = Arc::clone(&query);
            tokio::spawn(async move { coordinator.get_or_refresh(&query).await })
        });
        let losers = futures::future::join_all(losers).await;
        for outcome in losers {
            let outcome = outcome.unwrap().unwrap();
            assert!(!outcome.refreshed);
            assert_eq!(outcome.generation, 0);
            assert_eq!(outcome.snapshot.row_count(), 0);
        }

        gate.notify_one();
        let winner = winner.await.unwrap().unwrap();
        assert!(winner.refreshed);
        assert_eq!(winner.snapshot.row_count(), 3);
        assert_eq!(executor.calls(), 1);
    }
}

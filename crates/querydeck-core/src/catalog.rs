//! Registries of queries and consumers, and the read API over them.
//!
//! [`Catalog`] owns the [`QueryRegistry`], the [`ConsumerRegistry`], and
//! the [`RefreshCoordinator`]. It is built once from loaded definitions
//! and then shared (behind an `Arc`) with the HTTP layer. Nothing here is
//! a process-wide global.

use std::collections::BTreeMap;
use std::sync::Arc;

use querydeck_types::Snapshot;
use tracing::warn;

use crate::config::{ConfigError, ConsumerConfig, QueryConfig};
use crate::consumer::ConsumerDefinition;
use crate::error::{CacheError, EntityKind};
use crate::query::QueryDefinition;
use crate::refresh::RefreshCoordinator;
use crate::rules::Rule;
use crate::view::{OutputKind, RenderedBatch, render_table, render_time_series};

/// Query definitions keyed by name.
#[derive(Debug, Default)]
pub struct QueryRegistry {
    queries: BTreeMap<String, Arc<QueryDefinition>>,
}

impl QueryRegistry {
    /// Register a query. Returns `false` and leaves the registry unchanged
    /// if the name is already taken.
    pub fn insert(&mut self, query: QueryDefinition) -> bool {
        if self.queries.contains_key(&query.name) {
            return false;
        }
        self.queries.insert(query.name.clone(), Arc::new(query));
        true
    }

    /// Look up a query by name.
    pub fn get(&self, name: &str) -> Option<&Arc<QueryDefinition>> {
        self.queries.get(name)
    }

    /// Number of registered queries.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Whether no queries are registered.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// A registered consumer together with the query it reads.
#[derive(Debug, Clone)]
pub struct ConsumerBinding {
    /// The consumer.
    pub consumer: Arc<ConsumerDefinition>,
    /// The query it is bound to.
    pub query: Arc<QueryDefinition>,
}

/// Consumer definitions keyed by name.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    consumers: BTreeMap<String, ConsumerBinding>,
}

impl ConsumerRegistry {
    /// Register a consumer. Returns `false` and leaves the registry
    /// unchanged if the name is already taken.
    pub fn insert(&mut self, binding: ConsumerBinding) -> bool {
        if self.consumers.contains_key(&binding.consumer.name) {
            return false;
        }
        self.consumers
            .insert(binding.consumer.name.clone(), binding);
        true
    }

    /// Look up a consumer by name.
    pub fn get(&self, name: &str) -> Option<&ConsumerBinding> {
        self.consumers.get(name)
    }

    /// All consumer names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.consumers.keys().map(String::as_str)
    }

    /// Number of registered consumers.
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Whether no consumers are registered.
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

/// The loaded set of queries and consumers and the read operations on them.
#[derive(Debug)]
pub struct Catalog {
    queries: QueryRegistry,
    consumers: ConsumerRegistry,
    coordinator: RefreshCoordinator,
}

impl Catalog {
    /// Assemble a catalog from already-built registries.
    pub const fn new(
        queries: QueryRegistry,
        consumers: ConsumerRegistry,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            queries,
            consumers,
            coordinator,
        }
    }

    /// Build a catalog from loaded definitions.
    ///
    /// Duplicate names, consumers referencing unknown queries, and
    /// consumers with an unbuildable rule are skipped. Each skip is logged
    /// and returned alongside the catalog.
    pub fn from_definitions(
        query_configs: Vec<QueryConfig>,
        consumer_configs: Vec<ConsumerConfig>,
        coordinator: RefreshCoordinator,
    ) -> (Self, Vec<ConfigError>) {
        let mut diagnostics = Vec::new();
        let mut skip = |e: ConfigError| {
            warn!(error = %e, "skipping definition");
            diagnostics.push(e);
        };

        let mut queries = QueryRegistry::default();
        for config in query_configs {
            let name = config.name.clone();
            if !queries.insert(QueryDefinition::from_config(config)) {
                skip(ConfigError::Duplicate {
                    kind: EntityKind::Query,
                    name,
                });
            }
        }

        let mut consumers = ConsumerRegistry::default();
        for config in consumer_configs {
            let Some(query) = queries.get(&config.query_name) else {
                skip(ConfigError::UnknownQuery {
                    consumer: config.name,
                    query: config.query_name,
                });
                continue;
            };

            let rules = match config
                .rules
                .iter()
                .map(Rule::from_config)
                .collect::<Result<Vec<_>, _>>()
            {
                Ok(rules) => rules,
                Err(e) => {
                    skip(ConfigError::Consumer {
                        name: config.name,
                        source: Box::new(e),
                    });
                    continue;
                }
            };

            let consumer = ConsumerDefinition::new(
                &config.name,
                &query.name,
                rules,
                query.cache.current().snapshot,
            );
            let binding = ConsumerBinding {
                consumer: Arc::new(consumer),
                query: Arc::clone(query),
            };
            if !consumers.insert(binding) {
                skip(ConfigError::Duplicate {
                    kind: EntityKind::Consumer,
                    name: config.name,
                });
            }
        }

        (Self::new(queries, consumers, coordinator), diagnostics)
    }

    /// Look up a query definition.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] for an unknown name.
    pub fn query(&self, name: &str) -> Result<&Arc<QueryDefinition>, CacheError> {
        self.queries
            .get(name)
            .ok_or_else(|| CacheError::not_found(EntityKind::Query, name))
    }

    /// Look up a consumer and its query.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] for an unknown name.
    pub fn consumer(&self, name: &str) -> Result<&ConsumerBinding, CacheError> {
        self.consumers
            .get(name)
            .ok_or_else(|| CacheError::not_found(EntityKind::Consumer, name))
    }

    /// All consumer names, sorted.
    pub fn list_consumer_names(&self) -> Vec<String> {
        self.consumers.names().map(str::to_owned).collect()
    }

    /// Number of registered queries.
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Number of registered consumers.
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Return a consumer's derived snapshot, refreshing its query first if
    /// the query's TTL has run out.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] for an unknown consumer or data
    /// source, and [`CacheError::Fetch`] if a refresh failed.
    pub async fn fetch(&self, consumer_name: &str) -> Result<Arc<Snapshot>, CacheError> {
        let binding = self.consumer(consumer_name)?;
        self.fetch_binding(binding).await
    }

    async fn fetch_binding(&self, binding: &ConsumerBinding) -> Result<Arc<Snapshot>, CacheError> {
        let outcome = self.coordinator.get_or_refresh(&binding.query).await?;
        Ok(binding.consumer.derive(&outcome))
    }

    /// Fetch several consumers and render them into one batch.
    ///
    /// All names are resolved before anything is fetched. Any failure
    /// aborts the whole batch; no partial batch is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] if any name is unknown,
    /// [`CacheError::Fetch`] if a refresh fails, and
    /// [`CacheError::TypeMismatch`] if a time-series render fails.
    pub async fn fetch_batch(
        &self,
        consumer_names: &[String],
        kind: OutputKind,
    ) -> Result<RenderedBatch, CacheError> {
        let bindings = consumer_names
            .iter()
            .map(|name| self.consumer(name))
            .collect::<Result<Vec<_>, _>>()?;

        match kind {
            OutputKind::Table => {
                let mut frames = Vec::with_capacity(bindings.len());
                for binding in bindings {
                    let snapshot = self.fetch_binding(binding).await?;
                    frames.push(render_table(&snapshot));
                }
                Ok(RenderedBatch::Table(frames))
            }
            OutputKind::TimeSeries => {
                let mut frames = Vec::with_capacity(bindings.len());
                for binding in bindings {
                    let snapshot = self.fetch_binding(binding).await?;
                    frames.push(render_time_series(&binding.consumer.name, &snapshot)?);
                }
                Ok(RenderedBatch::TimeSeries(frames))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use querydeck_types::{CellValue, ResultSet};
    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;
    use crate::executor::{DataSourceExecutor, ExecuteError};

    /// Returns the same rows on every call and counts calls.
    struct FixedExecutor {
        calls: AtomicUsize,
        rows: Vec<Vec<CellValue>>,
    }

    #[async_trait]
    impl DataSourceExecutor for FixedExecutor {
        async fn execute(&self, source_name: &str, _query: &str) -> Result<ResultSet, ExecuteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if source_name != "warehouse" {
                return Err(ExecuteError::UnknownSource(source_name.to_owned()));
            }
            Ok(ResultSet {
                columns: Vec::new(),
                rows: self.rows.clone(),
            })
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn rows() -> Vec<Vec<CellValue>> {
        vec![
            vec![ts(10).into(), "east".into(), CellValue::Int(10)],
            vec![ts(20).into(), "west".into(), CellValue::Int(20)],
            vec![ts(30).into(), "east".into(), CellValue::Int(30)],
        ]
    }

    fn query(name: &str, database: &str) -> QueryConfig {
        QueryConfig {
            name: name.to_owned(),
            database_name: database.to_owned(),
            query_string: "SELECT ts, region, amount FROM sales".to_owned(),
            refresh_time: Some(60),
            column_list: vec!["ts".to_owned(), "region".to_owned(), "amount".to_owned()],
            row_list: Vec::new(),
        }
    }

    fn consumer(name: &str, query: &str, rules: Vec<serde_json::Value>) -> ConsumerConfig {
        ConsumerConfig {
            name: name.to_owned(),
            query_name: query.to_owned(),
            rules,
        }
    }

    fn east_rule() -> serde_json::Value {
        json!({"rule_type": "regexrule", "column_header_to_check": "region", "regex_string": "east"})
    }

    fn time_rule() -> serde_json::Value {
        json!({"rule_type": "timerule", "time_column_header": "ts", "metric_column_header": "amount"})
    }

    fn catalog() -> (Catalog, Arc<FixedExecutor>, Arc<ManualClock>, Vec<ConfigError>) {
        let executor = Arc::new(FixedExecutor {
            calls: AtomicUsize::new(0),
            rows: rows(),
        });
        let clock = Arc::new(ManualClock::new(ts(1_700_000_000)));
        let coordinator = RefreshCoordinator::with_clock(executor.clone(), clock.clone());
        let (catalog, diagnostics) = Catalog::from_definitions(
            vec![query("sales", "warehouse"), query("sales", "warehouse"), query("orphan", "nowhere")],
            vec![
                consumer("east_sales", "sales", vec![east_rule()]),
                consumer("east_series", "sales", vec![east_rule(), time_rule()]),
                consumer("raw", "sales", Vec::new()),
                consumer(
                    "by_region",
                    "sales",
                    vec![json!({
                        "rule_type": "timerule",
                        "time_column_header": "region",
                        "metric_column_header": "amount"
                    })],
                ),
                consumer("dangling", "missing", Vec::new()),
                consumer("bad_rule", "sales", vec![json!({"rule_type": "pivot"})]),
                consumer("broken_db", "orphan", Vec::new()),
            ],
            coordinator,
        );
        (catalog, executor, clock, diagnostics)
    }

    #[test]
    fn load_skips_bad_definitions_and_keeps_the_rest() {
        let (catalog, _, _, diagnostics) = catalog();
        assert_eq!(catalog.query_count(), 2);
        assert_eq!(
            catalog.list_consumer_names(),
            vec!["broken_db", "by_region", "east_sales", "east_series", "raw"]
        );
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics.iter().any(|e| matches!(e, ConfigError::Duplicate { .. })));
        assert!(diagnostics.iter().any(|e| matches!(e, ConfigError::UnknownQuery { .. })));
        assert!(diagnostics.iter().any(|e| matches!(e, ConfigError::Consumer { .. })));
    }

    #[tokio::test]
    async fn fetch_applies_consumer_rules() {
        let (catalog, _, _, _) = catalog();
        let snap = catalog.fetch("east_sales").await.unwrap();
        let keys: Vec<u64> = snap.rows.keys().copied().collect();
        assert_eq!(keys, vec![1, 3]);

        let raw = catalog.fetch("raw").await.unwrap();
        assert_eq!(raw.row_count(), 3);
    }

    #[tokio::test]
    async fn consumers_share_one_query_refresh() {
        let (catalog, executor, clock, _) = catalog();
        catalog.fetch("east_sales").await.unwrap();
        catalog.fetch("raw").await.unwrap();
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

        clock.advance_secs(61);
        catalog.fetch("raw").await.unwrap();
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);

        // `east_sales` did not trigger the second refresh but still sees it.
        let snap = catalog.fetch("east_sales").await.unwrap();
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(snap.row_count(), 2);
    }

    #[tokio::test]
    async fn unknown_names_are_not_found() {
        let (catalog, _, _, _) = catalog();
        assert!(matches!(
            catalog.fetch("nope").await,
            Err(CacheError::NotFound { kind: EntityKind::Consumer, .. })
        ));
        assert!(matches!(
            catalog.fetch("broken_db").await,
            Err(CacheError::NotFound { kind: EntityKind::Database, .. })
        ));
        assert!(catalog.query("sales").is_ok());
        assert!(catalog.query("nope").is_err());
    }

    #[tokio::test]
    async fn batch_renders_tables_in_request_order() {
        let (catalog, _, _, _) = catalog();
        let names = vec!["raw".to_owned(), "east_sales".to_owned()];
        let batch = catalog.fetch_batch(&names, OutputKind::Table).await.unwrap();
        let RenderedBatch::Table(frames) = batch else {
            panic!("expected table batch");
        };
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].rows.len(), 3);
        assert_eq!(frames[1].rows.len(), 2);
        assert_eq!(frames[1].columns[1].text, "region");
    }

    #[tokio::test]
    async fn batch_renders_time_series() {
        let (catalog, _, _, _) = catalog();
        let names = vec!["east_series".to_owned()];
        let batch = catalog.fetch_batch(&names, OutputKind::TimeSeries).await.unwrap();
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(
            json,
            json!([{"datapoints": [[10, 10_000], [30, 30_000]], "target": "east_series"}])
        );
    }

    #[tokio::test]
    async fn batch_aborts_on_any_failure() {
        let (catalog, executor, _, _) = catalog();
        let names = vec!["raw".to_owned(), "nope".to_owned()];
        let err = catalog.fetch_batch(&names, OutputKind::Table).await.unwrap_err();
        assert!(matches!(err, CacheError::NotFound { .. }));
        // Names are resolved before anything is fetched.
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);

        // `by_region` puts a text column first, so it is not a series.
        let names = vec!["east_series".to_owned(), "by_region".to_owned()];
        let err = catalog
            .fetch_batch(&names, OutputKind::TimeSeries)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
    }
}

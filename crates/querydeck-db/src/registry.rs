//! Name-keyed registry of data sources.
//!
//! [`DataSourceRegistry`] is the production [`DataSourceExecutor`]: it
//! looks the data source up by name and runs the query on its pool.

use std::collections::BTreeMap;

use async_trait::async_trait;
use querydeck_core::config::{DataSourceConfig, DatabaseSettings};
use querydeck_core::{DataSourceExecutor, ExecuteError};
use querydeck_types::ResultSet;
use tracing::{debug, info, warn};

use crate::error::DbError;
use crate::source::SqlDataSource;

/// All registered data sources, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct DataSourceRegistry {
    sources: BTreeMap<String, SqlDataSource>,
}

impl DataSourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool for every definition and check reachability.
    ///
    /// Definitions that cannot be turned into a pool (unsupported driver,
    /// malformed URL, duplicate name) are skipped and reported. A data
    /// source that fails its initial `SELECT 1` stays registered, since
    /// the pool reconnects on the next query; the failure is logged only.
    pub async fn connect_all(
        configs: &[DataSourceConfig],
        settings: &DatabaseSettings,
    ) -> (Self, Vec<DbError>) {
        let mut registry = Self::new();
        let mut diagnostics = Vec::new();

        for config in configs {
            if registry.contains(&config.name) {
                warn!(source = %config.name, "duplicate data source ignored");
                diagnostics.push(DbError::Duplicate(config.name.clone()));
                continue;
            }

            let source = match SqlDataSource::connect_lazy(config, settings) {
                Ok(source) => source,
                Err(e) => {
                    warn!(source = %config.name, error = %e, "data source skipped");
                    diagnostics.push(e);
                    continue;
                }
            };

            match source.ping().await {
                Ok(()) => info!(
                    source = %config.name,
                    db_type = %config.db_type,
                    "data source connected"
                ),
                Err(e) => warn!(
                    source = %config.name,
                    error = %e,
                    "data source unreachable at startup, will retry on first query"
                ),
            }

            registry.insert(source);
        }

        (registry, diagnostics)
    }

    /// Register a data source. Returns `false` if the name was taken.
    pub fn insert(&mut self, source: SqlDataSource) -> bool {
        if self.sources.contains_key(source.name()) {
            return false;
        }
        self.sources.insert(source.name().to_owned(), source);
        true
    }

    /// Whether a data source with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Look up a data source.
    pub fn get(&self, name: &str) -> Option<&SqlDataSource> {
        self.sources.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Number of registered data sources.
    #[allow(clippy::missing_const_for_fn)]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the registry is empty.
    #[allow(clippy::missing_const_for_fn)]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Close every pool.
    pub async fn close_all(&self) {
        for source in self.sources.values() {
            source.close().await;
        }
    }
}

#[async_trait]
impl DataSourceExecutor for DataSourceRegistry {
    async fn execute(&self, source_name: &str, query: &str) -> Result<ResultSet, ExecuteError> {
        let source = self
            .get(source_name)
            .ok_or_else(|| ExecuteError::UnknownSource(source_name.to_owned()))?;

        let result = source
            .fetch_all(query)
            .await
            .map_err(|e| ExecuteError::Failed {
                source_name: source_name.to_owned(),
                message: e.to_string(),
            })?;

        debug!(source = source_name, rows = result.rows.len(), "query executed");
        Ok(result)
    }
}

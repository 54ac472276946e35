//! Query definitions and their cached state.

use querydeck_types::Snapshot;
use serde::Serialize;

use crate::cache::CacheEntry;
use crate::config::QueryConfig;

/// One named query against one data source, plus its cache entry.
///
/// Created once at load time and never removed while the process runs.
/// Only the [`RefreshCoordinator`](crate::refresh::RefreshCoordinator)
/// mutates the cache entry.
#[derive(Debug)]
pub struct QueryDefinition {
    /// Unique logical name.
    pub name: String,
    /// Name of the data source the query runs against.
    pub database_name: String,
    /// Query text handed to the executor verbatim.
    pub query_string: String,
    /// Refresh interval in seconds; `None` fetches once and keeps the result.
    pub refresh_interval_secs: Option<u64>,
    /// Column names applied to fetched rows.
    pub column_list: Vec<String>,
    /// Decorative row labels applied to fetched snapshots.
    pub row_list: Vec<String>,
    /// Cached snapshot and refresh gate.
    pub cache: CacheEntry,
}

impl QueryDefinition {
    /// Build a definition from its loaded configuration.
    pub fn from_config(config: QueryConfig) -> Self {
        let placeholder = Snapshot::empty(
            &config.name,
            config.column_list.clone(),
            config.row_list.clone(),
        );
        Self {
            name: config.name,
            database_name: config.database_name,
            query_string: config.query_string,
            refresh_interval_secs: config.refresh_time,
            column_list: config.column_list,
            row_list: config.row_list,
            cache: CacheEntry::new(placeholder),
        }
    }

    /// Serializable view of this definition for inspection endpoints.
    pub fn summary(&self) -> QuerySummary<'_> {
        QuerySummary {
            name: &self.name,
            database_name: &self.database_name,
            query_string: &self.query_string,
            refresh_time: self.refresh_interval_secs,
            column_list: &self.column_list,
            row_list: &self.row_list,
            last_refresh_time: self
                .cache
                .last_refresh()
                .map(|t| t.to_rfc3339()),
        }
    }
}

/// JSON shape of a query definition.
#[derive(Debug, Serialize)]
pub struct QuerySummary<'a> {
    /// Unique logical name.
    pub name: &'a str,
    /// Target data source.
    pub database_name: &'a str,
    /// Query text.
    pub query_string: &'a str,
    /// Refresh interval in seconds.
    pub refresh_time: Option<u64>,
    /// Configured column names.
    pub column_list: &'a [String],
    /// Configured row labels.
    pub row_list: &'a [String],
    /// RFC 3339 time of the last successful refresh.
    pub last_refresh_time: Option<String>,
}

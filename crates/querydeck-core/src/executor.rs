//! Data source executor seam.
//!
//! The cache never talks to a database directly. It hands a data source
//! name and the query text to a [`DataSourceExecutor`] and gets back a
//! [`ResultSet`]. The production implementation lives in
//! `querydeck-db`; tests substitute scripted executors.

use async_trait::async_trait;
use querydeck_types::ResultSet;

/// Errors an executor can report.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// No data source is registered under this name.
    #[error("could not find database `{0}`")]
    UnknownSource(String),

    /// Connectivity, syntax, or row decoding failure.
    #[error("query against `{source_name}` failed: {message}")]
    Failed {
        /// The data source the query ran against.
        source_name: String,
        /// Description of the failure.
        message: String,
    },
}

/// Runs query text against a named data source.
#[async_trait]
pub trait DataSourceExecutor: Send + Sync {
    /// Execute `query` against the data source called `source_name` and
    /// return every row in fetch order.
    ///
    /// # Errors
    ///
    /// Returns [`ExecuteError::UnknownSource`] for an unregistered name and
    /// [`ExecuteError::Failed`] when the query or row scan fails.
    async fn execute(&self, source_name: &str, query: &str) -> Result<ResultSet, ExecuteError>;
}

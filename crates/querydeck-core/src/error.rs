//! Runtime error types for the query cache.
//!
//! [`CacheError`] covers everything a read can fail with once the
//! catalog is loaded. Load-time problems live in
//! [`ConfigError`](crate::config::ConfigError) instead.

use std::fmt;

use crate::executor::ExecuteError;

/// The kind of named entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A consumer (data selector) definition.
    Consumer,
    /// A query definition.
    Query,
    /// A data source (database) definition.
    Database,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Consumer => "dataselector",
            Self::Query => "query",
            Self::Database => "database",
        })
    }
}

/// Errors surfaced by reads against the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An unknown consumer, query, or data source name.
    #[error("could not find {kind} `{name}`")]
    NotFound {
        /// What was being looked up.
        kind: EntityKind,
        /// The name that did not resolve.
        name: String,
    },

    /// The data source query or row decoding failed.
    #[error("error getting results from query `{query}`: {message}")]
    Fetch {
        /// The query being refreshed.
        query: String,
        /// Description of the failure.
        message: String,
    },

    /// A renderer's structural expectation about a snapshot was violated.
    #[error("type mismatch in `{consumer}`: {detail}")]
    TypeMismatch {
        /// The consumer whose snapshot could not be rendered.
        consumer: String,
        /// What was expected and what was found.
        detail: String,
    },
}

impl CacheError {
    /// Convenience constructor for [`CacheError::NotFound`].
    pub fn not_found(kind: EntityKind, name: &str) -> Self {
        Self::NotFound {
            kind,
            name: name.to_owned(),
        }
    }

    /// Attach the query name to an executor failure.
    pub fn from_execute(query: &str, err: ExecuteError) -> Self {
        match err {
            ExecuteError::UnknownSource(name) => Self::NotFound {
                kind: EntityKind::Database,
                name,
            },
            ExecuteError::Failed { message, .. } => Self::Fetch {
                query: query.to_owned(),
                message,
            },
        }
    }
}

//! Error types for the data source layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] error or the definition problem that stopped a data source
//! from being registered.

use querydeck_core::ConfigError;

/// Errors that can occur in the data source layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A database operation failed.
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),

    /// A data source definition could not be turned into connect options.
    #[error("configuration error: {0}")]
    Config(String),

    /// A data source definition was rejected at load time.
    #[error(transparent)]
    Definition(#[from] ConfigError),

    /// Two data sources share a name.
    #[error("duplicate data source `{0}`, keeping the first definition")]
    Duplicate(String),
}

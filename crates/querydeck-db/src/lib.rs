//! SQL data sources for querydeck (`PostgreSQL` + `MySQL`).
//!
//! Each data source definition becomes a lazily connecting [`sqlx`] pool.
//! The [`DataSourceRegistry`] holds them by name and implements
//! [`querydeck_core::DataSourceExecutor`], which is the only way the cache
//! reaches a database.
//!
//! ```text
//! RefreshCoordinator
//!     |
//!     +-- DataSourceRegistry::execute(source, sql)
//!         |-- SqlDataSource (PgPool | MySqlPool)
//!         +-- decode        (driver row -> Vec<CellValue>)
//! ```
//!
//! # Modules
//!
//! - [`registry`] -- Name-keyed registry, the production executor
//! - [`source`] -- One pooled data source and its connect options
//! - [`decode`] -- SQL type name to [`CellValue`] decoding
//! - [`error`] -- Shared error types
//!
//! [`CellValue`]: querydeck_types::CellValue

pub mod decode;
pub mod error;
pub mod registry;
pub mod source;

// Re-export primary types for convenience.
pub use error::DbError;
pub use registry::DataSourceRegistry;
pub use source::{SqlDataSource, SqlPool};

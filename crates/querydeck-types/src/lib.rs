//! Shared type definitions for querydeck.
//!
//! This crate holds the value types that flow between the data source
//! executor, the snapshot cache, the rule pipeline, and the HTTP layer.
//!
//! # Modules
//!
//! - [`cell`] -- Dynamically-typed cell values read from a result set
//! - [`snapshot`] -- Captured tabular result sets and raw executor output

pub mod cell;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use cell::CellValue;
pub use snapshot::{ResultSet, RowIndex, Snapshot};

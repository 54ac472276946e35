//! Query result cache, single-flight refresh, and rule pipeline.
//!
//! This crate is the core of querydeck. It keeps one cached [`Snapshot`]
//! per configured query, refetches it through a [`DataSourceExecutor`]
//! when its TTL runs out, and derives per-consumer views by folding an
//! ordered rule list over each fresh snapshot.
//!
//! # Read path
//!
//! ```text
//! Catalog::fetch(consumer)
//!     |
//!     +-- RefreshCoordinator::get_or_refresh(query)
//!     |       fresh?          -> cached snapshot
//!     |       stale, gate won -> executor fetch, store, release gate
//!     |       stale, gate lost -> stale snapshot, no waiting
//!     |
//!     +-- ConsumerDefinition::derive(outcome)
//!     |       new generation  -> apply_rules(...)
//!     |       same generation -> previous derived view
//!     |
//!     +-- view::render_table / view::render_time_series (batch reads)
//! ```
//!
//! # Modules
//!
//! - [`cache`] -- Per-query cached state and the atomic refresh gate
//! - [`refresh`] -- TTL check and single-flight refetch
//! - [`rules`] -- Projection and row filter rules, and the pipeline fold
//! - [`consumer`] -- Consumer definitions and their derived views
//! - [`view`] -- Table and time-series renderers
//! - [`catalog`] -- Registries and the read API
//! - [`config`] -- Service config and definition directory loading
//! - [`executor`] -- The data source seam
//! - [`clock`] -- Time source for staleness decisions
//! - [`error`] -- Runtime error types
//!
//! # Limitations
//!
//! The refresh gate and cache are process-local. Running several
//! instances gives each its own cache and refresh timing, with no
//! consistency between them.
//!
//! [`Snapshot`]: querydeck_types::Snapshot

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod consumer;
pub mod error;
pub mod executor;
pub mod query;
pub mod refresh;
pub mod rules;
pub mod view;

// Re-export primary types for convenience.
pub use cache::{CacheEntry, CachedSnapshot};
pub use catalog::{Catalog, ConsumerBinding, ConsumerRegistry, QueryRegistry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, Definitions, ServiceConfig, load_definitions};
pub use consumer::ConsumerDefinition;
pub use error::{CacheError, EntityKind};
pub use executor::{DataSourceExecutor, ExecuteError};
pub use query::QueryDefinition;
pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use rules::{ProjectionRule, RowFilterRule, Rule, apply_rules};
pub use view::{OutputKind, RenderedBatch, TableFrame, TimeSeriesFrame};

//! HTTP API for querydeck.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Grafana simple-JSON datasource endpoints** (`/`, `/search`,
//!   `/query`) so dashboards can plot cached consumer views as tables or
//!   time series
//! - **Inspection endpoints** for consumer definitions, their derived
//!   snapshots, and query definitions
//!
//! # Architecture
//!
//! Every handler reads through the shared
//! [`Catalog`](querydeck_core::Catalog). A request that lands on a stale
//! query refreshes it inline; requests that arrive while that refresh is
//! running are answered from the cached snapshot.

pub mod error;
pub mod grafana;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;

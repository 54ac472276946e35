//! Shared application state for the HTTP API.

use std::sync::Arc;

use querydeck_core::Catalog;

/// State shared by every handler.
///
/// The catalog is built once at startup and never replaced; all cache
/// mutation happens inside it.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded queries and consumers.
    pub catalog: Arc<Catalog>,
}

impl AppState {
    /// Wrap a loaded catalog.
    pub const fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

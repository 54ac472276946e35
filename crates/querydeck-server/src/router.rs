//! Axum router construction.
//!
//! Assembles all routes into a single [`Router`] with CORS middleware so
//! browser-side Grafana panels can call the API directly.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LINK};
use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// How long browsers may cache a preflight response.
const CORS_MAX_AGE_SECS: u64 = 300;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- health check
/// - `POST /search` -- consumer names
/// - `POST /query` -- batch render
/// - `GET /dataselector/{name}` -- consumer definition
/// - `GET /dataselectordata/{name}` -- consumer snapshot
/// - `GET /query/{name}` -- query definition
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([LINK])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS));

    Router::new()
        // Grafana simple-JSON datasource
        .route("/", get(handlers::index))
        .route("/search", post(handlers::search))
        .route("/query", post(handlers::query))
        // Inspection
        .route("/dataselector/{name}", get(handlers::get_dataselector))
        .route("/dataselectordata/{name}", get(handlers::get_dataselector_data))
        .route("/query/{name}", get(handlers::get_query))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Endpoint handlers.
//!
//! All handlers go through the shared [`Catalog`](querydeck_core::Catalog)
//! in [`AppState`]. Reads that find a stale query trigger its refresh
//! inline; concurrent requests for the same query get the cached snapshot
//! instead of waiting.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Health check for the Grafana datasource |
//! | `POST` | `/search` | List consumer names |
//! | `POST` | `/query` | Render a batch of consumers as table or time series |
//! | `GET` | `/dataselector/{name}` | Consumer definition |
//! | `GET` | `/dataselectordata/{name}` | Consumer's derived snapshot |
//! | `GET` | `/query/{name}` | Query definition |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use querydeck_core::RenderedBatch;
use querydeck_types::Snapshot;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::grafana::QueryRequest;
use crate::state::AppState;

/// `GET /`: the datasource health check. Always `200 OK`, empty body.
pub async fn index() -> StatusCode {
    StatusCode::OK
}

/// `POST /search`: every consumer name, sorted.
///
/// Grafana sends a `{"target": ...}` body; it is ignored.
pub async fn search(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.catalog.list_consumer_names())
}

/// `POST /query`: fetch and render every target.
///
/// The first target's `type` decides the shape of the whole batch. Any
/// failing target fails the request.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<RenderedBatch>, ApiError> {
    let kind = request
        .output_kind()
        .ok_or_else(|| ApiError::BadRequest("query request has no targets".to_owned()))?;
    let names = request.consumer_names();
    debug!(?kind, targets = ?names, "batch query");

    let batch = state.catalog.fetch_batch(&names, kind).await?;
    Ok(Json(batch))
}

/// `GET /dataselector/{name}`: the consumer definition with its current
/// derived snapshot. Does not trigger a refresh.
pub async fn get_dataselector(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let binding = state.catalog.consumer(&name)?;
    Ok(Json(serde_json::to_value(binding.consumer.summary())?))
}

/// `GET /dataselectordata/{name}`: the consumer's derived snapshot,
/// refreshed first if its query is stale.
pub async fn get_dataselector_data(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Arc<Snapshot>>, ApiError> {
    Ok(Json(state.catalog.fetch(&name).await?))
}

/// `GET /query/{name}`: the query definition and its last refresh time.
pub async fn get_query(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let query = state.catalog.query(&name)?;
    Ok(Json(serde_json::to_value(query.summary())?))
}

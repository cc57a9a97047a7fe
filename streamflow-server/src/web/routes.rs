//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tower_http::services::ServeDir;
use tracing::warn;

use crate::directory::DEFAULT_TAG_LIMIT;
use crate::station::StationRecord;

use super::dto::*;
use super::state::AppState;

/// Largest `limit` accepted by the tag endpoint.
pub const MAX_TAG_LIMIT: usize = 200;

/// Create the application router.
///
/// `static_dir` holds the UI bundle, served for every path not matched by an
/// API route.
pub fn create_router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stations/tag/:tag", get(stations_by_tag))
        .route("/api/stations/uuids", get(stations_by_uuids))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Top stations for a tag.
///
/// Mirror outages produce an empty list, not an error.
async fn stations_by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(query): Query<TagQuery>,
) -> Result<Json<Vec<StationRecord>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_TAG_LIMIT);
    if limit == 0 || limit > MAX_TAG_LIMIT {
        return Err(AppError::BadRequest {
            message: format!("limit must be between 1 and {MAX_TAG_LIMIT}, got {limit}"),
        });
    }

    Ok(Json(state.directory.fetch_stations_by_tag(&tag, limit).await))
}

/// Stations for a comma-separated list of ids.
async fn stations_by_uuids(
    State(state): State<AppState>,
    Query(query): Query<UuidQuery>,
) -> Json<Vec<StationRecord>> {
    let ids = query.ids();
    Json(state.directory.fetch_stations_by_uuids(&ids).await)
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
        };

        warn!(%status, %message, "Request rejected");

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub uptime_seconds: i64,
    /// Endpoint identifier of the configured inference client
    pub inference: String,
}

/// GET /health
///
/// Makes no calls to external services.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "scones-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("SCONES_GIT_HASH").to_string(),
        build_timestamp: env!("SCONES_BUILD_TIMESTAMP").to_string(),
        uptime_seconds: (Utc::now() - state.startup_time).num_seconds(),
        inference: state.services.inference.name().to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

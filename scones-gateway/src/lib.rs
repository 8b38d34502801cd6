//! scones-gateway library - HTTP invocation surface for the pipeline steps
//!
//! Each step handler is reachable as `POST /invoke/<step>`, so the external
//! orchestrator (or a Lambda web adapter in front of this service) can call
//! them as independent callbacks.

use axum::Router;
use chrono::{DateTime, Utc};
use scones_pipeline::Services;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Clients and configuration injected into every step
    pub services: Services,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::invoke_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

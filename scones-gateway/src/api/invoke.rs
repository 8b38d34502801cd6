//! Step invocation endpoint
//!
//! `POST /invoke/<step>` with the step's JSON input (bare or wrapped in the
//! previous step's envelope). Answers with the step's `{status, data}`
//! envelope; the HTTP status mirrors the envelope status.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use scones_pipeline::Step;
use serde_json::Value;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /invoke/:step
pub async fn invoke_step(
    State(state): State<AppState>,
    Path(step_name): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let step: Step = step_name
        .parse()
        .map_err(|_| ApiError::UnknownStep(step_name.clone()))?;
    let event: Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let invocation_id = Uuid::new_v4();
    let span = tracing::info_span!("invoke", step = %step, invocation_id = %invocation_id);

    let envelope = async {
        info!("Step invoked");
        state.services.invoke(step, event).await
    }
    .instrument(span)
    .await?;

    let status = StatusCode::from_u16(envelope.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(envelope)).into_response())
}

/// Build step invocation routes
pub fn invoke_routes() -> Router<AppState> {
    Router::new().route("/invoke/:step", post(invoke_step))
}

//! Error types for scones-gateway
//!
//! Error bodies use the `{errorType, errorMessage}` shape so an orchestrator
//! catching a failed step gets a `Cause` the unknown-category step can parse.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scones_common::error::ErrorReport;
use scones_common::Error as PipelineError;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// No handler registered under the requested step name (404)
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// Request body is not JSON (400)
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    /// Step handler failure
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    /// HTTP status for each error kind
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownStep(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(err) => match err {
                PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                PipelineError::ThresholdNotMet { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Storage { .. }
                | PipelineError::Inference { .. }
                | PipelineError::Workflow(_)
                | PipelineError::Filing { .. } => StatusCode::BAD_GATEWAY,
                PipelineError::Mapping(_)
                | PipelineError::Config(_)
                | PipelineError::Io(_)
                | PipelineError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Lambda-compatible error body
    pub fn report(&self) -> ErrorReport {
        match self {
            ApiError::UnknownStep(_) => ErrorReport {
                error_type: "UnknownStep".to_string(),
                error_message: self.to_string(),
            },
            ApiError::BadRequest(_) => ErrorReport {
                error_type: "InvalidInput".to_string(),
                error_message: self.to_string(),
            },
            ApiError::Pipeline(err) => err.to_report(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let report = self.report();

        if status.is_server_error() {
            tracing::error!(error_type = %report.error_type, "Step failed: {}", self);
        } else {
            tracing::warn!(error_type = %report.error_type, "Step rejected: {}", self);
        }

        (status, Json(report)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

//! Common error types for the pipeline steps

use serde::Serialize;
use thiserror::Error;

use crate::events::ThresholdFailure;

/// Common result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every step handler
#[derive(Error, Debug)]
pub enum Error {
    /// Object store request failed
    #[error("Storage error for s3://{bucket}/{key}: {message}")]
    Storage {
        bucket: String,
        key: String,
        message: String,
    },

    /// Workflow orchestrator request failed
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// Inference endpoint request failed or answered with unusable data
    #[error("Inference error from {endpoint}: {message}")]
    Inference { endpoint: String, message: String },

    /// No confidence score reached the configured threshold
    #[error("Threshold not met for s3://{s3_bucket}/{s3_key}{}", best_score_suffix(.best))]
    ThresholdNotMet {
        s3_bucket: String,
        s3_key: String,
        best: Option<f64>,
    },

    /// Category mapping missing or lacking the selected index
    #[error("Category mapping error: {0}")]
    Mapping(String),

    /// Copy-then-delete into the categorized location failed
    #[error("Error moving data to datalake ({source_key} -> {destination_key}): {cause}")]
    Filing {
        source_key: String,
        destination_key: String,
        #[source]
        cause: Box<Error>,
    },

    /// Malformed step input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a storage error for the given object
    pub fn storage(bucket: &str, key: &str, message: impl ToString) -> Self {
        Error::Storage {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    /// Stable error name reported to the orchestrator as `errorType`
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Storage { .. } => "StorageError",
            Error::Workflow(_) => "WorkflowError",
            Error::Inference { .. } => "InferenceError",
            Error::ThresholdNotMet { .. } => "ThresholdNotMet",
            Error::Mapping(_) => "MappingError",
            Error::Filing { .. } => "FilingError",
            Error::InvalidInput(_) => "InvalidInput",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
        }
    }

    /// Message reported to the orchestrator as `errorMessage`
    ///
    /// A failed threshold check reports the JSON-encoded [`ThresholdFailure`]
    /// so the unknown-category filing step can recover bucket and key from
    /// the orchestrator's catch payload.
    pub fn error_message(&self) -> String {
        match self {
            Error::ThresholdNotMet { s3_bucket, s3_key, .. } => {
                let failure = ThresholdFailure::new(s3_bucket, s3_key);
                serde_json::to_string(&failure).unwrap_or_else(|_| self.to_string())
            }
            other => other.to_string(),
        }
    }

    /// Lambda-compatible error body
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            error_type: self.error_type().to_string(),
            error_message: self.error_message(),
        }
    }
}

/// Error body in the `{errorType, errorMessage}` shape orchestrators embed
/// into a catch payload's `Cause`
fn best_score_suffix(best: &Option<f64>) -> String {
    match best {
        Some(score) => format!(" (best score {:.4})", score),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq)]
pub struct ErrorReport {
    #[serde(rename = "errorType")]
    pub error_type: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_error_message_carries_location() {
        let err = Error::ThresholdNotMet {
            s3_bucket: "b".to_string(),
            s3_key: "raw/cat.png".to_string(),
            best: Some(0.5),
        };

        let display = err.to_string();
        assert_eq!(display, "Threshold not met for s3://b/raw/cat.png (best score 0.5000)");

        let wire: serde_json::Value = serde_json::from_str(&err.error_message()).unwrap();
        assert_eq!(wire["errorMessage"], "Threshold not met");
        assert_eq!(wire["s3_bucket"], "b");
        assert_eq!(wire["s3_key"], "raw/cat.png");
    }

    #[test]
    fn test_threshold_error_without_scores_omits_best() {
        let err = Error::ThresholdNotMet {
            s3_bucket: "b".to_string(),
            s3_key: "raw/cat.png".to_string(),
            best: None,
        };
        assert_eq!(err.to_string(), "Threshold not met for s3://b/raw/cat.png");
    }

    #[test]
    fn test_filing_error_wraps_cause() {
        let err = Error::Filing {
            source_key: "raw/a.png".to_string(),
            destination_key: "out/bicycle/a.png".to_string(),
            cause: Box::new(Error::storage("b", "raw/a.png", "access denied")),
        };

        let message = err.to_string();
        assert!(message.starts_with("Error moving data to datalake"));
        assert!(message.contains("access denied"));
        assert_eq!(err.error_type(), "FilingError");
    }

    #[test]
    fn test_report_shape() {
        let report = Error::InvalidInput("missing key".to_string()).to_report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errorType"], "InvalidInput");
        assert_eq!(json["errorMessage"], "Invalid input: missing key");
    }
}

//! Payload types exchanged between pipeline steps
//!
//! Each step consumes the previous step's payload:
//!
//! ```text
//! UploadEvent -> WorkflowInput -> SerializedPayload -> InferenceResult
//!     -> InferenceResult (threshold passed) -> FilingReceipt
//!     -> FailurePayload (threshold failed)  -> FilingReceipt
//! ```
//!
//! Field names follow the JSON the orchestrator passes around, so serde
//! renames are only used where the wire format is not snake_case.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{Error, Result};

/// Message carried by a failed threshold check
pub const THRESHOLD_NOT_MET: &str = "Threshold not met";

// ========================================
// Trigger
// ========================================

/// Newly created object in storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEvent {
    pub bucket: String,
    pub key: String,
}

/// Raw S3 event notification (`{"Records": [...]}`)
#[derive(Debug, Clone, Deserialize)]
pub struct S3Notification {
    #[serde(rename = "Records")]
    pub records: Vec<S3NotificationRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3NotificationRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3BucketRef,
    pub object: S3ObjectRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3ObjectRef {
    pub key: String,
}

/// Trigger input: either a flat upload event or a storage notification
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TriggerEvent {
    Upload(UploadEvent),
    Notification(S3Notification),
}

impl TriggerEvent {
    /// Resolve to the uploaded object (first record of a notification)
    pub fn into_upload_event(self) -> Result<UploadEvent> {
        match self {
            TriggerEvent::Upload(event) => Ok(event),
            TriggerEvent::Notification(notification) => notification
                .records
                .into_iter()
                .next()
                .map(|record| UploadEvent {
                    bucket: record.s3.bucket.name,
                    key: record.s3.object.key,
                })
                .ok_or_else(|| Error::InvalidInput("S3 notification has no records".to_string())),
        }
    }
}

/// Trigger step result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerReport {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_arn: Option<String>,
}

// ========================================
// Workflow steps
// ========================================

/// Workflow execution input, built once per upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub s3_bucket: String,
    pub s3_key: String,
}

impl From<UploadEvent> for WorkflowInput {
    fn from(event: UploadEvent) -> Self {
        Self {
            s3_bucket: event.bucket,
            s3_key: event.key,
        }
    }
}

/// Serialization step output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPayload {
    /// Base64-encoded object bytes
    pub image_data: String,
    pub s3_bucket: String,
    pub s3_key: String,
    /// Always empty at this stage
    #[serde(default)]
    pub inferences: Vec<f64>,
}

/// Classification step output, also the threshold step's input and output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub inferences: Inferences,
    pub s3_bucket: String,
    pub s3_key: String,
}

/// Confidence scores as produced by the inference endpoint
///
/// The classifier forwards the endpoint's response text untouched
/// (`Encoded`); an orchestrator may also hand over an already decoded list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Inferences {
    Encoded(String),
    Scores(Vec<Score>),
}

/// One confidence score, numeric or stringified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Number(f64),
    Text(String),
}

impl Score {
    pub fn value(&self) -> Result<f64> {
        match self {
            Score::Number(n) => Ok(*n),
            Score::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::InvalidInput(format!("Non-numeric inference score: {:?}", s))),
        }
    }
}

impl Inferences {
    /// Decode to floating point scores, in endpoint order
    pub fn scores(&self) -> Result<Vec<f64>> {
        match self {
            Inferences::Encoded(text) => {
                let scores: Vec<Score> = serde_json::from_str(text).map_err(|e| {
                    Error::InvalidInput(format!("Inferences are not a JSON list: {}", e))
                })?;
                scores.iter().map(Score::value).collect()
            }
            Inferences::Scores(scores) => scores.iter().map(Score::value).collect(),
        }
    }
}

// ========================================
// Filing
// ========================================

/// Static index-to-label table maintained in the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub key_mapping: HashMap<String, String>,
}

impl CategoryMapping {
    /// Label for an inference vector index
    pub fn category_for(&self, index: usize) -> Result<&str> {
        self.key_mapping
            .get(&index.to_string())
            .map(String::as_str)
            .ok_or_else(|| Error::Mapping(format!("No category mapped for index {}", index)))
    }
}

/// Structured payload raised by a failed threshold check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdFailure {
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    pub s3_bucket: String,
    pub s3_key: String,
}

impl ThresholdFailure {
    pub fn new(s3_bucket: &str, s3_key: &str) -> Self {
        Self {
            error_message: THRESHOLD_NOT_MET.to_string(),
            s3_bucket: s3_bucket.to_string(),
            s3_key: s3_key.to_string(),
        }
    }
}

/// Orchestrator catch payload routed to the unknown-category step
///
/// `Cause` is normally a JSON string whose `errorMessage` is itself a JSON
/// string holding a [`ThresholdFailure`]. Already-decoded objects are
/// accepted at either level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePayload {
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
    #[serde(rename = "Cause")]
    pub cause: Value,
}

impl FailurePayload {
    /// Recover the original object location from the nested cause
    pub fn threshold_failure(&self) -> Result<ThresholdFailure> {
        let cause = decode_nested(&self.cause, "Cause")?;
        let message = cause
            .get("errorMessage")
            .ok_or_else(|| Error::InvalidInput("Cause has no errorMessage".to_string()))?;
        let failure = decode_nested(message, "errorMessage")?;

        serde_json::from_value(failure)
            .map_err(|e| Error::InvalidInput(format!("errorMessage is not a threshold failure: {}", e)))
    }
}

fn decode_nested(value: &Value, field: &str) -> Result<Value> {
    match value {
        Value::String(text) => serde_json::from_str(text)
            .map_err(|e| Error::InvalidInput(format!("{} is not valid JSON: {}", field, e))),
        Value::Object(_) => Ok(value.clone()),
        other => Err(Error::InvalidInput(format!(
            "{} must be a JSON object or string, got {}",
            field, other
        ))),
    }
}

/// Result of a copy-then-delete filing step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingReceipt {
    pub s3_bucket: String,
    pub source_key: String,
    pub destination_key: String,
    pub category: String,
}

/// File name part of an object key (text after the last `/`)
pub fn object_file_name(key: &str) -> Result<&str> {
    match key.rsplit('/').next() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(Error::InvalidInput(format!("Object key has no file name: {:?}", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_resolves_first_record() {
        let event: TriggerEvent = serde_json::from_value(json!({
            "Records": [
                {"s3": {"bucket": {"name": "uploads"}, "object": {"key": "raw/cat.png", "size": 12}}},
                {"s3": {"bucket": {"name": "other"}, "object": {"key": "raw/dog.png"}}}
            ]
        }))
        .unwrap();

        let upload = event.into_upload_event().unwrap();
        assert_eq!(upload.bucket, "uploads");
        assert_eq!(upload.key, "raw/cat.png");
    }

    #[test]
    fn test_empty_notification_is_invalid() {
        let event: TriggerEvent = serde_json::from_value(json!({"Records": []})).unwrap();
        assert!(matches!(event.into_upload_event(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_inferences_decode_encoded_text() {
        let inferences = Inferences::Encoded("[0.01, 0.98, 0.0]".to_string());
        assert_eq!(inferences.scores().unwrap(), vec![0.01, 0.98, 0.0]);
    }

    #[test]
    fn test_inferences_decode_stringified_list() {
        let result: InferenceResult = serde_json::from_value(json!({
            "inferences": ["0.2", 0.7],
            "s3_bucket": "b",
            "s3_key": "k"
        }))
        .unwrap();
        assert_eq!(result.inferences.scores().unwrap(), vec![0.2, 0.7]);
    }

    #[test]
    fn test_inferences_reject_garbage() {
        assert!(Inferences::Encoded("not json".to_string()).scores().is_err());
        assert!(Inferences::Encoded("[\"high\"]".to_string()).scores().is_err());
    }

    #[test]
    fn test_failure_payload_nested_strings() {
        let failure = ThresholdFailure::new("b", "raw/cat.png");
        let cause = json!({
            "errorMessage": serde_json::to_string(&failure).unwrap(),
            "errorType": "ThresholdNotMet"
        });
        let payload: FailurePayload = serde_json::from_value(json!({
            "Error": "ThresholdNotMet",
            "Cause": cause.to_string()
        }))
        .unwrap();

        assert_eq!(payload.threshold_failure().unwrap(), failure);
    }

    #[test]
    fn test_failure_payload_decoded_objects() {
        let payload: FailurePayload = serde_json::from_value(json!({
            "Cause": {"errorMessage": {"errorMessage": "Threshold not met", "s3_bucket": "b", "s3_key": "k"}}
        }))
        .unwrap();

        let failure = payload.threshold_failure().unwrap();
        assert_eq!(failure.s3_bucket, "b");
        assert_eq!(failure.s3_key, "k");
    }

    #[test]
    fn test_failure_payload_without_message_is_invalid() {
        let payload: FailurePayload =
            serde_json::from_value(json!({"Cause": "{\"errorType\": \"States.Timeout\"}"})).unwrap();
        assert!(matches!(payload.threshold_failure(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_category_lookup() {
        let mapping: CategoryMapping =
            serde_json::from_value(json!({"key_mapping": {"2": "bicycle"}})).unwrap();
        assert_eq!(mapping.category_for(2).unwrap(), "bicycle");
        assert!(matches!(mapping.category_for(0), Err(Error::Mapping(_))));
    }

    #[test]
    fn test_object_file_name() {
        assert_eq!(object_file_name("raw/cat.png").unwrap(), "cat.png");
        assert_eq!(object_file_name("cat.png").unwrap(), "cat.png");
        assert!(object_file_name("raw/").is_err());
    }
}

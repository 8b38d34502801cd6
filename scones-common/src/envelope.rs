//! Result envelope returned by every step handler
//!
//! Every step answers `{"status": <u16>, "data": <step payload>}`. The
//! orchestrator forwards `data` as the next step's input; steps also accept
//! an input that is still wrapped in an envelope (see [`StepInput`]).

use serde::{Deserialize, Serialize};

/// Status reported for a completed step
pub const STATUS_OK: u16 = 200;

/// Status reported by the trigger step when the workflow could not be started
pub const STATUS_FAILED: u16 = 500;

/// `{status, data}` result envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub data: T,
}

impl<T> Envelope<T> {
    /// Successful result
    pub fn ok(data: T) -> Self {
        Self {
            status: STATUS_OK,
            data,
        }
    }

    /// Failed result that is reported rather than raised
    pub fn failed(data: T) -> Self {
        Self {
            status: STATUS_FAILED,
            data,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Step input that may arrive bare or still wrapped by the previous step
///
/// The wrapped form is tried first, so a payload type must not itself carry
/// both a `status` and a `data` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StepInput<T> {
    Wrapped(Envelope<T>),
    Bare(T),
}

impl<T> StepInput<T> {
    pub fn into_inner(self) -> T {
        match self {
            StepInput::Wrapped(envelope) => envelope.data,
            StepInput::Bare(payload) => payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WorkflowInput;
    use serde_json::json;

    #[test]
    fn test_step_input_accepts_both_shapes() {
        let bare: StepInput<WorkflowInput> =
            serde_json::from_value(json!({"s3_bucket": "b", "s3_key": "k"})).unwrap();
        let wrapped: StepInput<WorkflowInput> = serde_json::from_value(
            json!({"status": 200, "data": {"s3_bucket": "b", "s3_key": "k"}}),
        )
        .unwrap();

        assert_eq!(bare.into_inner(), wrapped.into_inner());
    }

    #[test]
    fn test_envelope_serializes_status_and_data() {
        let value = serde_json::to_value(Envelope::ok("done")).unwrap();
        assert_eq!(value, json!({"status": 200, "data": "done"}));
        assert!(!Envelope::failed(()).is_ok());
    }
}

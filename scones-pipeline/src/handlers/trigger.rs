//! Trigger step: start one workflow execution per uploaded object

use scones_common::envelope::Envelope;
use scones_common::events::{TriggerReport, UploadEvent, WorkflowInput};
use scones_common::WorkflowClient;
use tracing::{error, info};

/// Start the classification workflow for an uploaded object
///
/// Failures are reported in a status 500 envelope instead of being raised;
/// there is no retry.
pub async fn start_workflow(
    workflow: &dyn WorkflowClient,
    state_machine_arn: &str,
    event: UploadEvent,
) -> Envelope<TriggerReport> {
    info!(bucket = %event.bucket, key = %event.key, "Processing upload");

    let input = WorkflowInput::from(event);
    let payload = match serde_json::to_string(&input) {
        Ok(payload) => payload,
        Err(e) => return failure(format!("could not encode workflow input: {}", e)),
    };

    match workflow.start_execution(state_machine_arn, &payload).await {
        Ok(execution_arn) => {
            info!(execution_arn = %execution_arn, "Workflow started");
            Envelope::ok(TriggerReport {
                message: "Step Function Started!".to_string(),
                execution_arn: Some(execution_arn),
            })
        }
        Err(e) => {
            error!(state_machine = %state_machine_arn, "Failed to start workflow: {}", e);
            failure(e.to_string())
        }
    }
}

fn failure(cause: String) -> Envelope<TriggerReport> {
    Envelope::failed(TriggerReport {
        message: format!("Failed to run scones unlimited state machine: {}", cause),
        execution_arn: None,
    })
}

//! Clients constructed once at startup and injected into each step
//!
//! [`Services::from_config`] selects backends from configuration;
//! [`Services::invoke`] decodes a JSON event for one [`Step`] and runs its
//! handler.

use scones_common::config::{InferenceBackend, PipelineConfig, StorageBackend};
use scones_common::envelope::{Envelope, StepInput};
use scones_common::events::{FailurePayload, InferenceResult, SerializedPayload, TriggerEvent, WorkflowInput};
use scones_common::{Error, InferenceClient, ObjectStore, Result, WorkflowClient};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::backends::aws::{self, S3ObjectStore, SageMakerInferenceClient, StepFunctionsClient};
use crate::backends::{FixedInferenceClient, HttpInferenceClient, LocalObjectStore};
use crate::handlers;

/// Pipeline step names as exposed to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Trigger,
    Serialize,
    Classify,
    Threshold,
    FileDatalake,
    FileUnknown,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Trigger,
        Step::Serialize,
        Step::Classify,
        Step::Threshold,
        Step::FileDatalake,
        Step::FileUnknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Trigger => "trigger",
            Step::Serialize => "serialize",
            Step::Classify => "classify",
            Step::Threshold => "threshold",
            Step::FileDatalake => "file-datalake",
            Step::FileUnknown => "file-unknown",
        }
    }

    /// Steps that need a configured state machine
    pub fn starts_workflow(&self) -> bool {
        matches!(self, Step::Trigger)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown step: {}", s)))
    }
}

/// Injected clients plus the configuration the handlers read
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn ObjectStore>,
    pub workflow: Arc<dyn WorkflowClient>,
    pub inference: Arc<dyn InferenceClient>,
    pub config: Arc<PipelineConfig>,
}

impl Services {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        workflow: Arc<dyn WorkflowClient>,
        inference: Arc<dyn InferenceClient>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            workflow,
            inference,
            config: Arc::new(config),
        }
    }

    /// Build the configured backends
    ///
    /// The SDK configuration is loaded once and shared by every AWS client.
    /// Without an AWS storage or inference backend it is never loaded up
    /// front; the workflow client then defers it to its first execution.
    pub async fn from_config(config: PipelineConfig) -> Result<Self> {
        let sdk_config = if uses_aws_backend(&config) {
            Some(aws::load_sdk_config(config.region.as_deref()).await)
        } else {
            None
        };

        let loaded_sdk_config = || {
            sdk_config
                .as_ref()
                .ok_or_else(|| Error::Config("AWS SDK configuration was not loaded".to_string()))
        };

        let store: Arc<dyn ObjectStore> = match config.storage.backend {
            StorageBackend::S3 => Arc::new(S3ObjectStore::new(loaded_sdk_config()?)),
            StorageBackend::Local => Arc::new(LocalObjectStore::new(config.storage.local_root.clone())),
        };

        let inference: Arc<dyn InferenceClient> = match config.inference.backend {
            InferenceBackend::SageMaker => Arc::new(SageMakerInferenceClient::new(
                loaded_sdk_config()?,
                config.inference.endpoint_name.clone(),
            )),
            InferenceBackend::Http => {
                let url = config
                    .inference
                    .url
                    .clone()
                    .ok_or_else(|| Error::Config("inference.url is required for the http backend".to_string()))?;
                Arc::new(HttpInferenceClient::new(
                    url,
                    Duration::from_secs(config.inference.timeout_secs),
                )?)
            }
            InferenceBackend::Fixed => Arc::new(FixedInferenceClient::new(&config.inference.fixed_response)),
        };

        let workflow: Arc<dyn WorkflowClient> = match &sdk_config {
            Some(sdk_config) => Arc::new(StepFunctionsClient::new(sdk_config)),
            None => Arc::new(StepFunctionsClient::deferred(config.region.clone())),
        };

        info!(
            storage = ?config.storage.backend,
            inference = ?config.inference.backend,
            endpoint = inference.name(),
            "Pipeline clients initialized"
        );

        Ok(Self::new(store, workflow, inference, config))
    }

    /// Decode `event` for `step`, run the handler, and return its envelope
    ///
    /// The event may be bare or wrapped in a previous step's envelope.
    pub async fn invoke(&self, step: Step, event: Value) -> Result<Envelope<Value>> {
        let config = &self.config;
        match step {
            Step::Trigger => {
                let upload = decode::<TriggerEvent>(step, event)?.into_upload_event()?;
                let result =
                    handlers::start_workflow(self.workflow.as_ref(), &config.state_machine_arn, upload).await;
                to_value(result)
            }
            Step::Serialize => {
                let input = decode::<WorkflowInput>(step, event)?;
                let result = handlers::serialize_image(self.store.as_ref(), &config.scratch_dir(), input).await?;
                to_value(result)
            }
            Step::Classify => {
                let payload = decode::<SerializedPayload>(step, event)?;
                let result = handlers::classify_image(
                    self.inference.as_ref(),
                    &config.inference.content_type,
                    payload,
                )
                .await?;
                to_value(result)
            }
            Step::Threshold => {
                let result = decode::<InferenceResult>(step, event)?;
                to_value(handlers::filter_low_confidence(config.threshold, result).await?)
            }
            Step::FileDatalake => {
                let result = decode::<InferenceResult>(step, event)?;
                to_value(handlers::move_to_datalake(self.store.as_ref(), &config.storage, result).await?)
            }
            Step::FileUnknown => {
                let payload = decode::<FailurePayload>(step, event)?;
                to_value(handlers::move_to_unknown(self.store.as_ref(), &config.storage, payload).await?)
            }
        }
    }
}

/// True when storage or inference talks to AWS directly
fn uses_aws_backend(config: &PipelineConfig) -> bool {
    config.storage.backend == StorageBackend::S3 || config.inference.backend == InferenceBackend::SageMaker
}

fn decode<T: DeserializeOwned>(step: Step, event: Value) -> Result<T> {
    serde_json::from_value::<StepInput<T>>(event)
        .map(StepInput::into_inner)
        .map_err(|e| Error::InvalidInput(format!("Malformed {} input: {}", step, e)))
}

fn to_value<T: Serialize>(envelope: Envelope<T>) -> Result<Envelope<Value>> {
    Ok(Envelope {
        status: envelope.status,
        data: serde_json::to_value(envelope.data)?,
    })
}

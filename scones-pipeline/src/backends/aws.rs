//! AWS-managed services: S3, Step Functions and the SageMaker runtime
//!
//! The clients share one SDK configuration, loaded from the standard AWS
//! environment (credentials chain, region) only when an AWS backend is
//! selected.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sagemakerruntime::primitives::Blob;
use scones_common::{Error, InferenceClient, ObjectStore, Result, WorkflowClient};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Load the shared SDK configuration, optionally pinning the region
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

// ============================================================================
// S3
// ============================================================================

/// S3-backed object store
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        debug!(bucket, key, "S3 GetObject");
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::storage(bucket, key, aws_sdk_s3::error::DisplayErrorContext(e)))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| Error::storage(bucket, key, e))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn copy_object(&self, bucket: &str, source_key: &str, destination_key: &str) -> Result<()> {
        debug!(bucket, source_key, destination_key, "S3 CopyObject");
        self.client
            .copy_object()
            .copy_source(copy_source(bucket, source_key))
            .bucket(bucket)
            .key(destination_key)
            .send()
            .await
            .map_err(|e| Error::storage(bucket, source_key, aws_sdk_s3::error::DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        debug!(bucket, key, "S3 DeleteObject");
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::storage(bucket, key, aws_sdk_s3::error::DisplayErrorContext(e)))?;
        Ok(())
    }
}

/// `CopySource` header value: `<bucket>/<url-encoded key>`
///
/// Unreserved characters and `/` pass through; everything else is
/// percent-encoded byte by byte.
fn copy_source(bucket: &str, key: &str) -> String {
    let mut encoded = String::with_capacity(bucket.len() + key.len() + 1);
    encoded.push_str(bucket);
    encoded.push('/');
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

// ============================================================================
// Step Functions
// ============================================================================

/// Step Functions workflow client
///
/// A deferred client loads the SDK configuration on the first execution,
/// so runs that never trigger a workflow make no AWS lookups.
pub struct StepFunctionsClient {
    client: OnceCell<aws_sdk_sfn::Client>,
    region: Option<String>,
}

impl StepFunctionsClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: OnceCell::new_with(Some(aws_sdk_sfn::Client::new(config))),
            region: config.region().map(|r| r.as_ref().to_string()),
        }
    }

    pub fn deferred(region: Option<String>) -> Self {
        Self {
            client: OnceCell::new(),
            region,
        }
    }

    async fn client(&self) -> &aws_sdk_sfn::Client {
        self.client
            .get_or_init(|| async {
                debug!("Loading SDK configuration for Step Functions");
                aws_sdk_sfn::Client::new(&load_sdk_config(self.region.as_deref()).await)
            })
            .await
    }
}

#[async_trait]
impl WorkflowClient for StepFunctionsClient {
    async fn start_execution(&self, target: &str, input: &str) -> Result<String> {
        let output = self
            .client()
            .await
            .start_execution()
            .state_machine_arn(target)
            .input(input)
            .send()
            .await
            .map_err(|e| Error::Workflow(aws_sdk_sfn::error::DisplayErrorContext(e).to_string()))?;

        let execution_arn = output.execution_arn().to_string();
        info!(execution_arn = %execution_arn, "Step Functions execution started");
        Ok(execution_arn)
    }
}

// ============================================================================
// SageMaker runtime
// ============================================================================

/// SageMaker runtime `InvokeEndpoint` client
pub struct SageMakerInferenceClient {
    client: aws_sdk_sagemakerruntime::Client,
    endpoint_name: String,
}

impl SageMakerInferenceClient {
    pub fn new(config: &SdkConfig, endpoint_name: String) -> Self {
        Self {
            client: aws_sdk_sagemakerruntime::Client::new(config),
            endpoint_name,
        }
    }
}

#[async_trait]
impl InferenceClient for SageMakerInferenceClient {
    fn name(&self) -> &str {
        &self.endpoint_name
    }

    async fn invoke(&self, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let output = self
            .client
            .invoke_endpoint()
            .endpoint_name(&self.endpoint_name)
            .content_type(content_type)
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| Error::Inference {
                endpoint: self.endpoint_name.clone(),
                message: aws_sdk_sagemakerruntime::error::DisplayErrorContext(e).to_string(),
            })?;

        Ok(Option::<Blob>::from(output.body)
            .map(Blob::into_inner)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_source_keeps_plain_keys() {
        assert_eq!(copy_source("b", "raw/cat.png"), "b/raw/cat.png");
    }

    #[test]
    fn test_copy_source_encodes_special_characters() {
        assert_eq!(copy_source("b", "raw/my cat+1.png"), "b/raw/my%20cat%2B1.png");
        assert_eq!(copy_source("b", "raw/café.png"), "b/raw/caf%C3%A9.png");
    }
}

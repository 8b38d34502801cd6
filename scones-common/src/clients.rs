//! Client traits for the external services the pipeline talks to
//!
//! Handlers receive these as injected trait objects, so each step can run
//! against the managed services in production and against in-process
//! substitutes in tests or disconnected runs.

use async_trait::async_trait;
use std::path::Path;

use crate::{Error, Result};

/// Object store addressed by bucket + key
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the whole object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Fetch an object into a local file
    async fn download_to(&self, bucket: &str, key: &str, destination: &Path) -> Result<()> {
        let bytes = self.get_object(bucket, key).await?;
        tokio::fs::write(destination, bytes).await.map_err(|e| {
            Error::storage(
                bucket,
                key,
                format!("writing {} failed: {}", destination.display(), e),
            )
        })
    }

    /// Copy an object to another key within the same bucket
    async fn copy_object(&self, bucket: &str, source_key: &str, destination_key: &str) -> Result<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Managed workflow orchestrator
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Start an execution of `target` with a JSON input document
    ///
    /// Returns the execution identifier.
    async fn start_execution(&self, target: &str, input: &str) -> Result<String>;
}

/// Managed inference endpoint
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Endpoint identifier used in logs and errors
    fn name(&self) -> &str;

    /// Invoke the endpoint synchronously, returning the raw response body
    async fn invoke(&self, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>>;
}

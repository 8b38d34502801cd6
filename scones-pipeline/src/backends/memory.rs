//! In-process object store and workflow client
//!
//! Both record every call in order, and the store can be told to fail a
//! given operation, so handler tests can assert call ordering.

use async_trait::async_trait;
use scones_common::{Error, ObjectStore, Result, WorkflowClient};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

/// Object store operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Copy,
    Delete,
}

/// One recorded object store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get {
        bucket: String,
        key: String,
    },
    Copy {
        bucket: String,
        source_key: String,
        destination_key: String,
    },
    Delete {
        bucket: String,
        key: String,
    },
}

/// Object store held in memory
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    calls: Mutex<Vec<StoreCall>>,
    failing: Mutex<HashSet<StoreOp>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_object(self, bucket: &str, key: &str, bytes: Vec<u8>) -> Self {
        self.put_object(bucket, key, bytes);
        self
    }

    pub fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        lock(&self.objects).insert((bucket.to_string(), key.to_string()), bytes);
    }

    /// Current object contents, if present
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    /// Make every subsequent call of `op` fail
    pub fn fail(&self, op: StoreOp) {
        lock(&self.failing).insert(op);
    }

    fn record(&self, call: StoreCall) {
        lock(&self.calls).push(call);
    }

    fn check(&self, op: StoreOp, bucket: &str, key: &str) -> Result<()> {
        if lock(&self.failing).contains(&op) {
            return Err(Error::storage(bucket, key, format!("injected {:?} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.record(StoreCall::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        self.check(StoreOp::Get, bucket, key)?;

        self.object(bucket, key)
            .ok_or_else(|| Error::storage(bucket, key, "NoSuchKey"))
    }

    async fn copy_object(&self, bucket: &str, source_key: &str, destination_key: &str) -> Result<()> {
        self.record(StoreCall::Copy {
            bucket: bucket.to_string(),
            source_key: source_key.to_string(),
            destination_key: destination_key.to_string(),
        });
        self.check(StoreOp::Copy, bucket, source_key)?;

        let bytes = self
            .object(bucket, source_key)
            .ok_or_else(|| Error::storage(bucket, source_key, "NoSuchKey"))?;
        self.put_object(bucket, destination_key, bytes);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.record(StoreCall::Delete {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        self.check(StoreOp::Delete, bucket, key)?;

        // Deleting a missing key succeeds, as it does on S3
        lock(&self.objects).remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

/// Workflow client that records start requests instead of running anything
#[derive(Default)]
pub struct RecordingWorkflowClient {
    started: Mutex<Vec<(String, String)>>,
    failure: Option<String>,
}

impl RecordingWorkflowClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client whose start requests are recorded and then fail with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            started: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    /// `(target, input)` pairs received so far
    pub fn started(&self) -> Vec<(String, String)> {
        lock(&self.started).clone()
    }
}

#[async_trait]
impl WorkflowClient for RecordingWorkflowClient {
    async fn start_execution(&self, target: &str, input: &str) -> Result<String> {
        lock(&self.started).push((target.to_string(), input.to_string()));

        match &self.failure {
            Some(message) => Err(Error::Workflow(message.clone())),
            None => Ok(format!("{}:execution:{}", target, Uuid::new_v4())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//! Inference client with a fixed response, for disconnected runs

use async_trait::async_trait;
use scones_common::config::DEFAULT_FIXED_RESPONSE;
use scones_common::{InferenceClient, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Answers every invocation with the same body without any network access
///
/// Only the most recent request is kept.
pub struct FixedInferenceClient {
    response: Vec<u8>,
    invocations: AtomicUsize,
    last_request: Mutex<Option<(String, Vec<u8>)>>,
}

impl FixedInferenceClient {
    pub fn new(response: &str) -> Self {
        Self::from_bytes(response.as_bytes().to_vec())
    }

    pub fn from_bytes(response: Vec<u8>) -> Self {
        Self {
            response,
            invocations: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// `(content_type, body)` of the latest invocation
    pub fn last_request(&self) -> Option<(String, Vec<u8>)> {
        self.last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for FixedInferenceClient {
    fn default() -> Self {
        Self::new(DEFAULT_FIXED_RESPONSE)
    }
}

#[async_trait]
impl InferenceClient for FixedInferenceClient {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn invoke(&self, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        *self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((content_type.to_string(), body));
        Ok(self.response.clone())
    }
}

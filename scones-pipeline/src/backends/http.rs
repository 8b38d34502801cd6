//! Inference endpoint reached through a plain invocation URL

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use scones_common::{Error, InferenceClient, Result};
use std::time::Duration;

const USER_AGENT: &str = concat!("scones-pipeline/", env!("CARGO_PKG_VERSION"));

/// POSTs the image bytes to `url` and returns the response body
pub struct HttpInferenceClient {
    http_client: reqwest::Client,
    url: String,
}

impl HttpInferenceClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Inference {
                endpoint: url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { http_client, url })
    }

    fn error(&self, message: impl ToString) -> Error {
        Error::Inference {
            endpoint: self.url.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    fn name(&self) -> &str {
        &self.url
    }

    async fn invoke(&self, content_type: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        tracing::debug!(url = %self.url, size = body.len(), "POST inference request");

        let response = self
            .http_client
            .post(&self.url)
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.error(format!("HTTP {}: {}", status.as_u16(), error_text)));
        }

        let bytes = response.bytes().await.map_err(|e| self.error(e))?;
        Ok(bytes.to_vec())
    }
}

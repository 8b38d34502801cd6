//! Client implementations for the external services
//!
//! - `aws`: S3, Step Functions and SageMaker runtime via the AWS SDK
//! - `http`: inference endpoint reached by a plain invocation URL
//! - `local`: filesystem object store for disconnected runs
//! - `memory`: in-process store and workflow recorder
//! - `fixed`: inference client returning a configured response

pub mod aws;
pub mod fixed;
pub mod http;
pub mod local;
pub mod memory;

pub use fixed::FixedInferenceClient;
pub use http::HttpInferenceClient;
pub use local::LocalObjectStore;
pub use memory::{InMemoryObjectStore, RecordingWorkflowClient};

//! # Scones Common Library
//!
//! Shared code for every step of the image-classification pipeline:
//! - Payload types exchanged between steps (upload event through filing receipt)
//! - The `{status, data}` result envelope
//! - Closed error taxonomy
//! - Configuration loading
//! - Client traits for the object store, workflow orchestrator and inference endpoint

pub mod clients;
pub mod config;
pub mod envelope;
pub mod error;
pub mod events;

pub use clients::{InferenceClient, ObjectStore, WorkflowClient};
pub use envelope::Envelope;
pub use error::{Error, Result};

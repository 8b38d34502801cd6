//! scones-pipeline library - step handlers for the image-classification workflow
//!
//! Each handler is a stateless async function that receives one step's
//! payload plus the clients it needs, and returns the next step's payload.
//! The external orchestrator owns sequencing, retries and branching.

pub mod backends;
pub mod handlers;
pub mod scoring;
pub mod services;

pub use services::{Services, Step};

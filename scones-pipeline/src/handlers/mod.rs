//! Step handlers
//!
//! Orchestrator sequence (owned externally):
//! Start → Serialize → Classify → Threshold[pass → File, fail → FileUnknown] → End

pub mod classify;
pub mod filing;
pub mod serialize;
pub mod threshold;
pub mod trigger;

pub use classify::classify_image;
pub use filing::{move_to_datalake, move_to_unknown};
pub use serialize::serialize_image;
pub use threshold::filter_low_confidence;
pub use trigger::start_workflow;

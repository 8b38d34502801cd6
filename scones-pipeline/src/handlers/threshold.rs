//! Threshold step: reject low-confidence classifications

use scones_common::envelope::Envelope;
use scones_common::events::InferenceResult;
use scones_common::{Error, Result};
use tracing::{info, warn};

use crate::scoring::{best_score, meets_threshold};

/// Pass the result through unchanged if any score reaches `threshold`
///
/// Otherwise fail with [`Error::ThresholdNotMet`], whose wire message lets
/// the orchestrator route the object to the unknown category.
pub async fn filter_low_confidence(
    threshold: f64,
    result: InferenceResult,
) -> Result<Envelope<InferenceResult>> {
    let scores = result.inferences.scores()?;

    if meets_threshold(&scores, threshold) {
        info!(key = %result.s3_key, best = ?best_score(&scores), "Threshold met");
        return Ok(Envelope::ok(result));
    }

    warn!(
        bucket = %result.s3_bucket,
        key = %result.s3_key,
        best = ?best_score(&scores),
        threshold,
        "Threshold not met"
    );
    Err(Error::ThresholdNotMet {
        best: best_score(&scores),
        s3_bucket: result.s3_bucket,
        s3_key: result.s3_key,
    })
}

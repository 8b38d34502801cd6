//! Classify step: send the decoded image to the inference endpoint

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use scones_common::envelope::Envelope;
use scones_common::events::{InferenceResult, Inferences, SerializedPayload};
use scones_common::{Error, InferenceClient, Result};
use tracing::info;

/// Invoke the endpoint with the raw image bytes
///
/// The response text is carried through verbatim; parsing happens in the
/// threshold step.
pub async fn classify_image(
    inference: &dyn InferenceClient,
    content_type: &str,
    payload: SerializedPayload,
) -> Result<Envelope<InferenceResult>> {
    let image = STANDARD
        .decode(payload.image_data.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("image_data is not valid base64: {}", e)))?;

    info!(
        endpoint = inference.name(),
        key = %payload.s3_key,
        size = image.len(),
        "Invoking inference endpoint"
    );
    let response = inference.invoke(content_type, image).await?;

    let text = String::from_utf8(response).map_err(|e| Error::Inference {
        endpoint: inference.name().to_string(),
        message: format!("response is not UTF-8: {}", e),
    })?;

    Ok(Envelope::ok(InferenceResult {
        inferences: Inferences::Encoded(text),
        s3_bucket: payload.s3_bucket,
        s3_key: payload.s3_key,
    }))
}

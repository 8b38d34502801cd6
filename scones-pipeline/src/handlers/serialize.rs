//! Serialize step: fetch the uploaded image and base64-encode it

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use scones_common::envelope::Envelope;
use scones_common::events::{object_file_name, SerializedPayload, WorkflowInput};
use scones_common::{Error, ObjectStore, Result};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Download the object to a scratch file and return its base64 encoding
///
/// The scratch file name is unique per invocation and removed afterwards.
pub async fn serialize_image(
    store: &dyn ObjectStore,
    scratch_dir: &Path,
    input: WorkflowInput,
) -> Result<Envelope<SerializedPayload>> {
    let file_name = object_file_name(&input.s3_key).unwrap_or("object");
    let scratch_path = scratch_dir.join(format!("{}-{}", Uuid::new_v4(), file_name));

    debug!(path = %scratch_path.display(), "Downloading to scratch file");
    let read = match store
        .download_to(&input.s3_bucket, &input.s3_key, &scratch_path)
        .await
    {
        Ok(()) => tokio::fs::read(&scratch_path).await.map_err(Error::from),
        Err(e) => Err(e),
    };
    remove_scratch(&scratch_path).await;
    let bytes = read?;

    info!(
        bucket = %input.s3_bucket,
        key = %input.s3_key,
        size = bytes.len(),
        "Serialized image"
    );

    Ok(Envelope::ok(SerializedPayload {
        image_data: STANDARD.encode(&bytes),
        s3_bucket: input.s3_bucket,
        s3_key: input.s3_key,
        inferences: Vec::new(),
    }))
}

/// Remove the scratch file, which may be partial or absent after a failed download
async fn remove_scratch(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove scratch file: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::InMemoryObjectStore;
    use async_trait::async_trait;

    /// Store whose download leaves a truncated file behind before failing
    struct InterruptedDownloadStore;

    #[async_trait]
    impl ObjectStore for InterruptedDownloadStore {
        async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
            Err(Error::storage(bucket, key, "connection reset"))
        }

        async fn download_to(&self, bucket: &str, key: &str, destination: &Path) -> Result<()> {
            tokio::fs::write(destination, b"half-written").await?;
            Err(Error::storage(bucket, key, "connection reset"))
        }

        async fn copy_object(&self, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_object(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_encodes_object_bytes() {
        let scratch = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new().with_object("b", "raw/cat.png", b"\x89PNG fixture".to_vec());

        let result = serialize_image(
            &store,
            scratch.path(),
            WorkflowInput {
                s3_bucket: "b".to_string(),
                s3_key: "raw/cat.png".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(result.status, 200);
        assert_eq!(STANDARD.decode(&result.data.image_data).unwrap(), b"\x89PNG fixture");
        assert_eq!(result.data.s3_bucket, "b");
        assert_eq!(result.data.s3_key, "raw/cat.png");
        assert!(result.data.inferences.is_empty());

        // scratch file cleaned up
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_object_propagates_storage_error() {
        let scratch = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();

        let result = serialize_image(
            &store,
            scratch.path(),
            WorkflowInput {
                s3_bucket: "b".to_string(),
                s3_key: "raw/missing.png".to_string(),
            },
        )
        .await;

        assert!(matches!(result, Err(Error::Storage { .. })));
    }

    #[tokio::test]
    async fn test_failed_download_removes_partial_scratch_file() {
        let scratch = tempfile::tempdir().unwrap();

        let result = serialize_image(
            &InterruptedDownloadStore,
            scratch.path(),
            WorkflowInput {
                s3_bucket: "b".to_string(),
                s3_key: "raw/cat.png".to_string(),
            },
        )
        .await;

        assert!(matches!(result, Err(Error::Storage { .. })));
        let leftovers: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "scratch dir not empty: {:?}", leftovers);
    }
}

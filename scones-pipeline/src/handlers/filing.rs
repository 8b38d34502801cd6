//! Filing steps: relocate the processed object into its category folder
//!
//! Both steps copy before deleting. There is no transaction across the two
//! calls, so an interrupted invocation can leave a duplicate, never a loss.

use scones_common::config::StorageConfig;
use scones_common::envelope::Envelope;
use scones_common::events::{
    object_file_name, CategoryMapping, FailurePayload, FilingReceipt, InferenceResult,
};
use scones_common::{Error, ObjectStore, Result};
use tracing::info;

use crate::scoring::arg_max;

/// File a confidently classified object under its arg-max category
pub async fn move_to_datalake(
    store: &dyn ObjectStore,
    storage: &StorageConfig,
    result: InferenceResult,
) -> Result<Envelope<FilingReceipt>> {
    let scores = result.inferences.scores()?;

    let raw_mapping = store
        .get_object(&result.s3_bucket, &storage.mapping_key)
        .await?;
    let mapping: CategoryMapping = serde_json::from_slice(&raw_mapping).map_err(|e| {
        Error::Mapping(format!("{} is not a category mapping: {}", storage.mapping_key, e))
    })?;

    let index = arg_max(&scores)
        .ok_or_else(|| Error::InvalidInput("No inference scores to categorize".to_string()))?;
    let category = mapping.category_for(index)?.to_string();

    file_object(store, storage, &result.s3_bucket, &result.s3_key, category).await
}

/// File an object whose classification failed the threshold check
pub async fn move_to_unknown(
    store: &dyn ObjectStore,
    storage: &StorageConfig,
    payload: FailurePayload,
) -> Result<Envelope<FilingReceipt>> {
    let failure = payload.threshold_failure()?;

    file_object(
        store,
        storage,
        &failure.s3_bucket,
        &failure.s3_key,
        storage.unknown_category.clone(),
    )
    .await
}

async fn file_object(
    store: &dyn ObjectStore,
    storage: &StorageConfig,
    bucket: &str,
    source_key: &str,
    category: String,
) -> Result<Envelope<FilingReceipt>> {
    let destination_key = storage.categorized_key(&category, object_file_name(source_key)?);

    info!(bucket, source_key, destination_key = %destination_key, "Copying object");
    copy_then_delete(store, bucket, source_key, &destination_key)
        .await
        .map_err(|cause| Error::Filing {
            source_key: source_key.to_string(),
            destination_key: destination_key.clone(),
            cause: Box::new(cause),
        })?;
    info!(bucket, source_key, category = %category, "Object filed");

    Ok(Envelope::ok(FilingReceipt {
        s3_bucket: bucket.to_string(),
        source_key: source_key.to_string(),
        destination_key,
        category,
    }))
}

async fn copy_then_delete(
    store: &dyn ObjectStore,
    bucket: &str,
    source_key: &str,
    destination_key: &str,
) -> Result<()> {
    store.copy_object(bucket, source_key, destination_key).await?;
    store.delete_object(bucket, source_key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{InMemoryObjectStore, StoreCall, StoreOp};
    use scones_common::config::DEFAULT_MAPPING_KEY;
    use scones_common::events::{Inferences, ThresholdFailure};
    use serde_json::json;

    fn store_with_mapping(mapping: serde_json::Value) -> InMemoryObjectStore {
        InMemoryObjectStore::new()
            .with_object("b", DEFAULT_MAPPING_KEY, mapping.to_string().into_bytes())
            .with_object("b", "raw/bike.png", b"bike".to_vec())
    }

    fn result(encoded: &str) -> InferenceResult {
        InferenceResult {
            inferences: Inferences::Encoded(encoded.to_string()),
            s3_bucket: "b".to_string(),
            s3_key: "raw/bike.png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_arg_max_category_selected() {
        let store = store_with_mapping(json!({"key_mapping": {"0": "motorcycle", "2": "bicycle"}}));
        let storage = StorageConfig::default();

        let receipt = move_to_datalake(&store, &storage, result("[0.1, 0.2, 0.94, 0.05]"))
            .await
            .unwrap();

        assert_eq!(receipt.data.category, "bicycle");
        assert_eq!(
            receipt.data.destination_key,
            "projects/ml-workflow/landingzone/categorized_data/bicycle/bike.png"
        );
        assert_eq!(store.object("b", &receipt.data.destination_key), Some(b"bike".to_vec()));
        assert_eq!(store.object("b", "raw/bike.png"), None);
    }

    #[tokio::test]
    async fn test_copy_precedes_delete() {
        let store = store_with_mapping(json!({"key_mapping": {"2": "bicycle"}}));

        move_to_datalake(&store, &StorageConfig::default(), result("[0.1, 0.2, 0.94, 0.05]"))
            .await
            .unwrap();

        let mutations: Vec<StoreCall> = store
            .calls()
            .into_iter()
            .filter(|call| !matches!(call, StoreCall::Get { .. }))
            .collect();
        assert_eq!(
            mutations,
            vec![
                StoreCall::Copy {
                    bucket: "b".to_string(),
                    source_key: "raw/bike.png".to_string(),
                    destination_key: "projects/ml-workflow/landingzone/categorized_data/bicycle/bike.png"
                        .to_string(),
                },
                StoreCall::Delete {
                    bucket: "b".to_string(),
                    key: "raw/bike.png".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_copy_never_deletes() {
        let store = store_with_mapping(json!({"key_mapping": {"2": "bicycle"}}));
        store.fail(StoreOp::Copy);

        let err = move_to_datalake(&store, &StorageConfig::default(), result("[0.1, 0.2, 0.94, 0.05]"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Filing { .. }));
        assert!(err.to_string().starts_with("Error moving data to datalake"));
        assert!(!store.calls().iter().any(|call| matches!(call, StoreCall::Delete { .. })));
        assert_eq!(store.object("b", "raw/bike.png"), Some(b"bike".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_delete_is_wrapped() {
        let store = store_with_mapping(json!({"key_mapping": {"2": "bicycle"}}));
        store.fail(StoreOp::Delete);

        let err = move_to_datalake(&store, &StorageConfig::default(), result("[0.1, 0.2, 0.94, 0.05]"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Filing { .. }));
    }

    #[tokio::test]
    async fn test_unmapped_index_is_mapping_error() {
        let store = store_with_mapping(json!({"key_mapping": {"0": "motorcycle"}}));

        let err = move_to_datalake(&store, &StorageConfig::default(), result("[0.1, 0.99]"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Mapping(_)));
        assert!(store.calls().iter().all(|call| matches!(call, StoreCall::Get { .. })));
    }

    #[tokio::test]
    async fn test_missing_mapping_is_storage_error() {
        let store = InMemoryObjectStore::new().with_object("b", "raw/bike.png", b"bike".to_vec());

        let err = move_to_datalake(&store, &StorageConfig::default(), result("[0.99]"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Storage { .. }));
    }

    #[tokio::test]
    async fn test_unknown_filing_recovers_location_from_cause() {
        let store = InMemoryObjectStore::new().with_object("b", "raw/blurry.png", b"?".to_vec());
        let cause = json!({
            "errorMessage": serde_json::to_string(&ThresholdFailure::new("b", "raw/blurry.png")).unwrap(),
            "errorType": "ThresholdNotMet"
        });
        let payload: FailurePayload =
            serde_json::from_value(json!({"Error": "ThresholdNotMet", "Cause": cause.to_string()})).unwrap();

        let receipt = move_to_unknown(&store, &StorageConfig::default(), payload).await.unwrap();

        assert_eq!(receipt.status, 200);
        assert_eq!(receipt.data.category, "unknown");
        assert_eq!(
            receipt.data.destination_key,
            "projects/ml-workflow/landingzone/categorized_data/unknown/blurry.png"
        );
        assert!(store.object("b", "raw/blurry.png").is_none());
    }

    #[tokio::test]
    async fn test_unknown_filing_failed_copy_never_deletes() {
        let store = InMemoryObjectStore::new().with_object("b", "raw/blurry.png", b"?".to_vec());
        store.fail(StoreOp::Copy);
        let payload: FailurePayload = serde_json::from_value(json!({
            "Cause": {"errorMessage": {"errorMessage": "Threshold not met", "s3_bucket": "b", "s3_key": "raw/blurry.png"}}
        }))
        .unwrap();

        let err = move_to_unknown(&store, &StorageConfig::default(), payload).await.unwrap_err();

        assert!(matches!(err, Error::Filing { .. }));
        assert!(!store.calls().iter().any(|call| matches!(call, StoreCall::Delete { .. })));
    }
}

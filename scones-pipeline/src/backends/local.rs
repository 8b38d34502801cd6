//! Filesystem object store
//!
//! Objects live at `<root>/<bucket>/<key>`. Used for disconnected runs
//! together with the fixed inference backend.

use async_trait::async_trait;
use scones_common::{Error, ObjectStore, Result};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem path of an object; rejects keys escaping the bucket
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if bucket.is_empty() || key.is_empty() || escapes {
            return Err(Error::storage(bucket, key, "invalid bucket or key for local store"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::storage(bucket, key, e))
    }

    async fn download_to(&self, bucket: &str, key: &str, destination: &Path) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        tokio::fs::copy(&path, destination)
            .await
            .map_err(|e| Error::storage(bucket, key, e))?;
        Ok(())
    }

    async fn copy_object(&self, bucket: &str, source_key: &str, destination_key: &str) -> Result<()> {
        let source = self.object_path(bucket, source_key)?;
        let destination = self.object_path(bucket, destination_key)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage(bucket, destination_key, e))?;
        }
        debug!(from = %source.display(), to = %destination.display(), "Local copy");
        tokio::fs::copy(&source, &destination)
            .await
            .map_err(|e| Error::storage(bucket, source_key, e))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting a missing key succeeds, as it does on S3
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(bucket, key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_creates_category_folders() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());
        std::fs::create_dir_all(root.path().join("b/raw")).unwrap();
        std::fs::write(root.path().join("b/raw/cat.png"), b"cat").unwrap();

        store
            .copy_object("b", "raw/cat.png", "lake/animal/cat.png")
            .await
            .unwrap();
        store.delete_object("b", "raw/cat.png").await.unwrap();

        assert_eq!(store.get_object("b", "lake/animal/cat.png").await.unwrap(), b"cat");
        assert!(store.get_object("b", "raw/cat.png").await.is_err());
        assert!(store.delete_object("b", "raw/cat.png").await.is_ok());
    }

    #[tokio::test]
    async fn test_download_to() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());
        std::fs::create_dir_all(root.path().join("b")).unwrap();
        std::fs::write(root.path().join("b/dog.png"), b"dog").unwrap();

        let destination = scratch.path().join("dog.png");
        store.download_to("b", "dog.png", &destination).await.unwrap();

        assert_eq!(std::fs::read(destination).unwrap(), b"dog");
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(root.path());

        assert!(store.get_object("b", "../secret").await.is_err());
        assert!(store.get_object("b", "/etc/passwd").await.is_err());
        assert!(store.get_object("", "a.png").await.is_err());
    }
}

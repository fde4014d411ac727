//! File-backed blob store: one file per key under a data directory.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use super::{validate_key, BlobStore, StorageError};

/// Stores each key as `{base_dir}/{key}.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous blob intact.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    base_dir: PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `base_dir`. The directory is created on first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, blob: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.base_dir).await?;

        let tmp = self.base_dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, &blob).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Wrote {} bytes to {}", blob.len(), path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_lifecycle() {
        let temp = tempdir().unwrap();
        let store = FileBlobStore::new(temp.path().join("data"));

        // Missing key reads as nothing
        assert!(store.get("project").await.unwrap().is_none());

        store.set("project", b"{\"a\":1}".to_vec()).await.unwrap();
        assert_eq!(
            store.get("project").await.unwrap(),
            Some(b"{\"a\":1}".to_vec())
        );
        assert!(temp.path().join("data/project.json").exists());

        // Overwrite
        store.set("project", b"[]".to_vec()).await.unwrap();
        assert_eq!(store.get("project").await.unwrap(), Some(b"[]".to_vec()));

        store.delete("project").await.unwrap();
        assert!(store.get("project").await.unwrap().is_none());

        // Deleting again is fine
        store.delete("project").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_keys() {
        let temp = tempdir().unwrap();
        let store = FileBlobStore::new(temp.path());

        let result = store.set("../escape", b"x".to_vec()).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_file_store_survives_new_instance() {
        let temp = tempdir().unwrap();
        FileBlobStore::new(temp.path())
            .set("k", b"persisted".to_vec())
            .await
            .unwrap();

        let reopened = FileBlobStore::new(temp.path());
        assert_eq!(reopened.get("k").await.unwrap(), Some(b"persisted".to_vec()));
    }
}

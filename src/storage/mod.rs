//! Key-value blob storage used for the project snapshot and the credential.
//!
//! The task store never looks inside the backend: it hands over one serialized
//! blob per key and reads it back whole.

mod file;
mod memory;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;

/// Errors returned by a [`BlobStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Keys end up in file names, so path separators and empty keys are refused.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Filesystem failure in a file-backed store.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored blob could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Asynchronous key-value store holding opaque blobs.
///
/// Implementations must be `Send + Sync` so a store can be shared between the
/// task store and the credential store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the blob stored under `key`, or `None` if nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `blob` under `key`, replacing any previous value.
    async fn set(&self, key: &str, blob: Vec<u8>) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Reject keys that cannot be used as a single file name.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

//! API credential storage.
//!
//! The key lives in its own blob slot, apart from the project snapshot, so a
//! project reset does not sign the user out.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{BlobStore, StorageError};

/// Storage key of the API credential.
pub const CREDENTIAL_KEY: &str = "cubit_api_key";

/// Environment variable consulted when no credential has been saved.
pub const CREDENTIAL_ENV: &str = "GEMINI_API_KEY";

/// Cached credential with blob-store persistence.
pub struct CredentialStore {
    storage: Arc<dyn BlobStore>,
    cached: RwLock<Option<String>>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn BlobStore>) -> Self {
        Self {
            storage,
            cached: RwLock::new(None),
        }
    }

    /// Read the saved credential, falling back to `GEMINI_API_KEY`.
    ///
    /// Storage failures are logged and treated as "no credential".
    pub async fn load(&self) -> Option<String> {
        let stored = match self.storage.get(CREDENTIAL_KEY).await {
            Ok(Some(blob)) => String::from_utf8(blob)
                .map_err(|e| tracing::warn!("Stored credential is not UTF-8: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read credential: {}", e);
                None
            }
        };

        let credential = stored
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(Self::from_env);

        *self.cached.write().await = credential.clone();
        credential
    }

    fn from_env() -> Option<String> {
        std::env::var(CREDENTIAL_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Last loaded or saved credential.
    pub async fn get(&self) -> Option<String> {
        self.cached.read().await.clone()
    }

    /// Save a new credential.
    pub async fn set(&self, credential: &str) -> Result<(), StorageError> {
        let credential = credential.trim().to_string();
        self.storage
            .set(CREDENTIAL_KEY, credential.as_bytes().to_vec())
            .await?;
        *self.cached.write().await = Some(credential);
        Ok(())
    }

    /// Forget the credential.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage.delete(CREDENTIAL_KEY).await?;
        *self.cached.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;

    #[tokio::test]
    async fn test_credential_lifecycle() {
        let backing = Arc::new(MemoryBlobStore::new());
        let store = CredentialStore::new(backing.clone());

        store.set("  AIzaSy-test \n").await.unwrap();
        assert_eq!(store.get().await.as_deref(), Some("AIzaSy-test"));

        // A second instance reads what the first saved
        let reopened = CredentialStore::new(backing);
        assert_eq!(reopened.load().await.as_deref(), Some("AIzaSy-test"));

        reopened.clear().await.unwrap();
        assert!(reopened.get().await.is_none());
    }
}

//! Task store - the canonical, ordered task list mirrored to blob storage.
//!
//! Every mutation runs in two phases:
//! 1. In-memory commit: the new list replaces the old one and is published to
//!    subscribers. This always succeeds.
//! 2. Durable commit: the whole list is written as one [`ProjectSnapshot`].
//!    A failure here is returned, but phase 1 is not rolled back.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::credentials::CredentialStore;
use crate::storage::{BlobStore, StorageError};
use crate::task::{ProjectSnapshot, TaskId, TaskPatch, TaskRecord};

/// Storage key of the project snapshot.
pub const PROJECT_KEY: &str = "cubit_connect_project_v1";

/// Errors from task store mutations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The durable write failed. In-memory state already reflects the change.
    #[error("Failed to save project: {0}")]
    Persist(#[from] StorageError),

    #[error("Task {0} already exists")]
    DuplicateId(TaskId),

    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    /// An imported document was not a task list.
    #[error("Invalid project data: {0}")]
    InvalidImport(String),
}

/// Owns the task list; callers only mutate it through these methods.
pub struct TaskStore {
    storage: Arc<dyn BlobStore>,
    /// Serializes mutations so durable writes land in commit order.
    write_lock: Mutex<()>,
    tasks: watch::Sender<Vec<TaskRecord>>,
}

impl TaskStore {
    /// Create an empty store. Call [`TaskStore::load`] to pick up saved state.
    pub fn new(storage: Arc<dyn BlobStore>) -> Self {
        let (tasks, _) = watch::channel(Vec::new());
        Self {
            storage,
            write_lock: Mutex::new(()),
            tasks,
        }
    }

    /// Current task list (includes commits whose durable write is still pending).
    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.tasks.borrow().clone()
    }

    pub fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        self.tasks.borrow().iter().find(|t| &t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Observe every in-memory commit.
    pub fn subscribe(&self) -> watch::Receiver<Vec<TaskRecord>> {
        self.tasks.subscribe()
    }

    /// Replace the in-memory list with the saved snapshot.
    ///
    /// Missing, unreadable, or corrupt data loads as an empty list; this never fails.
    pub async fn load(&self) -> Vec<TaskRecord> {
        let _guard = self.write_lock.lock().await;

        let tasks = match self.read_snapshot().await {
            Ok(Some(snapshot)) => {
                tracing::info!("Loaded {} tasks from storage", snapshot.tasks.len());
                snapshot.tasks
            }
            Ok(None) => {
                tracing::debug!("No saved project found, starting empty");
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Failed to load project from storage: {}", e);
                Vec::new()
            }
        };

        self.tasks.send_replace(tasks.clone());
        tasks
    }

    async fn read_snapshot(&self) -> Result<Option<ProjectSnapshot>, StorageError> {
        match self.storage.get(PROJECT_KEY).await? {
            Some(blob) => Ok(Some(serde_json::from_slice(&blob)?)),
            None => Ok(None),
        }
    }

    /// Add a task to the end of the list.
    pub async fn append(&self, task: TaskRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.tasks();
        if next.iter().any(|t| t.id == task.id) {
            return Err(StoreError::DuplicateId(task.id));
        }
        next.push(task);

        self.commit(next).await
    }

    /// Merge `patch` into the task with `id`.
    ///
    /// An unknown id leaves the list unchanged but still writes it.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.tasks();
        match next.iter_mut().find(|t| &t.id == id) {
            Some(task) => task.apply(patch),
            None => tracing::debug!("Update for unknown task {}, list unchanged", id),
        }

        self.commit(next).await
    }

    /// Remove the task with `id`, if present.
    pub async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut next = self.tasks();
        next.retain(|t| &t.id != id);

        self.commit(next).await
    }

    /// Replace the whole list (bulk import). Repeated ids keep their first occurrence.
    pub async fn replace_all(&self, tasks: Vec<TaskRecord>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut seen = HashSet::new();
        let mut next = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            if !seen.insert(task.id.clone()) {
                tracing::warn!("Dropping imported task with repeated id {}", task.id);
                continue;
            }
            // Imported data may predate the invariants.
            let normalize = TaskPatch {
                timestamp_seconds: Some(task.timestamp_seconds),
                sub_steps: task.sub_steps.take(),
                ..Default::default()
            };
            task.apply(normalize);
            next.push(task);
        }

        self.commit(next).await
    }

    /// Delete the saved snapshot and empty the list. The credential is kept.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        self.remove_snapshot().await;
        self.tasks.send_replace(Vec::new());
        tracing::info!("Project reset");
        Ok(())
    }

    /// Reset the project and forget the credential.
    pub async fn full_logout(&self, credentials: &CredentialStore) -> Result<(), StoreError> {
        self.reset().await?;
        credentials.clear().await?;
        tracing::info!("Credential removed");
        Ok(())
    }

    /// Delete the saved snapshot only. Failures are logged, not returned.
    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        self.remove_snapshot().await;
    }

    async fn remove_snapshot(&self) {
        if let Err(e) = self.storage.delete(PROJECT_KEY).await {
            tracing::error!("Failed to clear project: {}", e);
        }
    }

    /// Serialize the current list as a snapshot document.
    pub fn export_json(&self) -> Result<String, StoreError> {
        let snapshot = ProjectSnapshot::now(self.tasks());
        serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StoreError::Persist(StorageError::Serialization(e)))
    }

    /// Replace the list with the tasks of an exported document.
    ///
    /// Accepts a full snapshot or a bare task array.
    pub async fn import_json(&self, json: &str) -> Result<usize, StoreError> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum ImportDoc {
            Snapshot(ProjectSnapshot),
            Tasks(Vec<TaskRecord>),
        }

        let tasks = match serde_json::from_str::<ImportDoc>(json) {
            Ok(ImportDoc::Snapshot(snapshot)) => snapshot.tasks,
            Ok(ImportDoc::Tasks(tasks)) => tasks,
            Err(e) => return Err(StoreError::InvalidImport(e.to_string())),
        };

        self.replace_all(tasks).await?;
        Ok(self.len())
    }

    /// Publish `next` in memory, then write it. Caller holds `write_lock`.
    async fn commit(&self, next: Vec<TaskRecord>) -> Result<(), StoreError> {
        self.tasks.send_replace(next.clone());

        let snapshot = ProjectSnapshot::now(next);
        let blob = serde_json::to_vec(&snapshot).map_err(StorageError::from)?;

        if let Err(e) = self.storage.set(PROJECT_KEY, blob).await {
            tracing::warn!(
                "Failed to save project ({} tasks); in-memory list is ahead of storage: {}",
                snapshot.tasks.len(),
                e
            );
            return Err(e.into());
        }

        tracing::debug!("Saved project with {} tasks", snapshot.tasks.len());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{FileBlobStore, MemoryBlobStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    /// Memory store whose reads and writes can be switched to fail.
    #[derive(Default)]
    pub(crate) struct FlakyStore {
        inner: MemoryBlobStore,
        pub(crate) fail_reads: AtomicBool,
        pub(crate) fail_writes: AtomicBool,
    }

    #[async_trait]
    impl BlobStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("read refused".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, blob: Vec<u8>) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("disk full".to_string()));
            }
            self.inner.set(key, blob).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("delete refused".to_string()));
            }
            self.inner.delete(key).await
        }
    }

    fn names(store: &TaskStore) -> Vec<String> {
        store.tasks().into_iter().map(|t| t.task_name).collect()
    }

    #[tokio::test]
    async fn test_append_then_reload() {
        let backing = Arc::new(MemoryBlobStore::new());
        let store = TaskStore::new(backing.clone());
        let task = TaskRecord::new("Intro", 3.0, "Welcome");

        store.append(task.clone()).await.unwrap();

        // Fresh store over the same backing simulates a restart
        let reloaded = TaskStore::new(backing);
        let tasks = reloaded.load().await;
        assert_eq!(tasks, vec![task]);
    }

    #[tokio::test]
    async fn test_file_backed_reload() {
        let temp = tempdir().unwrap();
        let store = TaskStore::new(Arc::new(FileBlobStore::new(temp.path())));
        store.append(TaskRecord::new("A", 1.0, "a")).await.unwrap();
        store.append(TaskRecord::new("B", 2.0, "b")).await.unwrap();

        let reloaded = TaskStore::new(Arc::new(FileBlobStore::new(temp.path())));
        reloaded.load().await;
        assert_eq!(names(&reloaded), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_update_unknown_id_still_writes_once() {
        let backing = Arc::new(MemoryBlobStore::new());
        let store = TaskStore::new(backing.clone());
        store.append(TaskRecord::new("A", 1.0, "a")).await.unwrap();
        let before = store.tasks();
        let writes = backing.write_count();

        store
            .update(&TaskId::from("missing"), TaskPatch::description("x"))
            .await
            .unwrap();

        assert_eq!(store.tasks(), before);
        assert_eq!(backing.write_count(), writes + 1);
    }

    #[tokio::test]
    async fn test_update_preserves_position() {
        let store = TaskStore::new(Arc::new(MemoryBlobStore::new()));
        let a = TaskRecord::new("A", 1.0, "a");
        let b = TaskRecord::new("B", 2.0, "b");
        let c = TaskRecord::new("C", 3.0, "c");
        for t in [&a, &b, &c] {
            store.append(t.clone()).await.unwrap();
        }

        store
            .update(&b.id, TaskPatch::sub_steps(vec!["s1".to_string(), "s2".to_string()]))
            .await
            .unwrap();

        let tasks = store.tasks();
        assert_eq!(names(&store), vec!["A", "B", "C"]);
        assert_eq!(tasks[1].id, b.id);
        assert_eq!(tasks[1].sub_steps.as_ref().unwrap().len(), 2);
        assert_eq!(tasks[1].description, "b");
    }

    #[tokio::test]
    async fn test_delete() {
        let backing = Arc::new(MemoryBlobStore::new());
        let store = TaskStore::new(backing.clone());
        let a = TaskRecord::new("A", 1.0, "a");
        let b = TaskRecord::new("B", 2.0, "b");
        store.append(a.clone()).await.unwrap();
        store.append(b.clone()).await.unwrap();

        store.delete(&a.id).await.unwrap();
        assert_eq!(names(&store), vec!["B"]);

        let reloaded = TaskStore::new(backing);
        assert_eq!(reloaded.load().await, vec![b]);
    }

    #[tokio::test]
    async fn test_append_rejects_duplicate_id() {
        let backing = Arc::new(MemoryBlobStore::new());
        let store = TaskStore::new(backing.clone());
        let task = TaskRecord::new("A", 1.0, "a");
        store.append(task.clone()).await.unwrap();

        let err = store.append(task.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == task.id));
        assert_eq!(store.len(), 1);
        assert_eq!(backing.write_count(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_optimistic_state() {
        let backing = Arc::new(FlakyStore::default());
        let store = TaskStore::new(backing.clone());
        let mut updates = store.subscribe();

        backing.fail_writes.store(true, Ordering::SeqCst);
        let err = store
            .append(TaskRecord::new("A", 1.0, "a"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Persist(_)));
        assert_eq!(names(&store), vec!["A"]);
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().len(), 1);

        // Storage never saw it
        backing.fail_writes.store(false, Ordering::SeqCst);
        let reloaded = TaskStore::new(backing);
        assert!(reloaded.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_fails_open() {
        let backing = Arc::new(FlakyStore::default());
        let store = TaskStore::new(backing.clone());
        store.append(TaskRecord::new("A", 1.0, "a")).await.unwrap();

        backing.fail_reads.store(true, Ordering::SeqCst);
        assert!(store.load().await.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_blob_is_empty() {
        let backing = Arc::new(MemoryBlobStore::new());
        backing
            .set(PROJECT_KEY, b"{not json".to_vec())
            .await
            .unwrap();

        let store = TaskStore::new(backing);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_replace_all_and_dedupe() {
        let store = TaskStore::new(Arc::new(MemoryBlobStore::new()));
        store.append(TaskRecord::new("Old", 0.0, "")).await.unwrap();

        let a = TaskRecord::new("A", 1.0, "a");
        let mut dup = TaskRecord::new("A again", 9.0, "dup");
        dup.id = a.id.clone();
        let mut bad = TaskRecord::new("B", 2.0, "b");
        bad.timestamp_seconds = -5.0;
        bad.sub_steps = Some(vec![]);

        store.replace_all(vec![a, dup, bad]).await.unwrap();

        let tasks = store.tasks();
        assert_eq!(names(&store), vec!["A", "B"]);
        assert_eq!(tasks[1].timestamp_seconds, 0.0);
        assert!(tasks[1].sub_steps.is_none());
    }

    #[tokio::test]
    async fn test_reset_keeps_credential() {
        let backing = Arc::new(MemoryBlobStore::new());
        let credentials = CredentialStore::new(backing.clone());
        credentials.set("secret-key").await.unwrap();

        let store = TaskStore::new(backing.clone());
        store.append(TaskRecord::new("A", 1.0, "a")).await.unwrap();
        store.reset().await.unwrap();

        assert!(store.is_empty());
        assert!(backing.get(PROJECT_KEY).await.unwrap().is_none());
        assert_eq!(credentials.load().await.as_deref(), Some("secret-key"));
    }

    #[tokio::test]
    async fn test_full_logout_removes_credential() {
        let backing = Arc::new(MemoryBlobStore::new());
        let credentials = CredentialStore::new(backing.clone());
        credentials.set("secret-key").await.unwrap();

        let store = TaskStore::new(backing.clone());
        store.append(TaskRecord::new("A", 1.0, "a")).await.unwrap();
        store.full_logout(&credentials).await.unwrap();

        assert!(store.is_empty());
        assert!(backing.get(PROJECT_KEY).await.unwrap().is_none());
        assert!(backing.get(crate::credentials::CREDENTIAL_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_swallows_failure() {
        let backing = Arc::new(FlakyStore::default());
        let store = TaskStore::new(backing.clone());
        store.append(TaskRecord::new("A", 1.0, "a")).await.unwrap();

        backing.fail_writes.store(true, Ordering::SeqCst);
        store.clear().await;

        // Only the persisted copy is targeted
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let store = TaskStore::new(Arc::new(MemoryBlobStore::new()));
        store.append(TaskRecord::new("A", 1.0, "a")).await.unwrap();
        store.append(TaskRecord::new("B", 2.0, "b")).await.unwrap();
        let exported = store.export_json().unwrap();

        let other = TaskStore::new(Arc::new(MemoryBlobStore::new()));
        assert_eq!(other.import_json(&exported).await.unwrap(), 2);
        assert_eq!(other.tasks(), store.tasks());

        let bare = serde_json::to_string(&store.tasks()).unwrap();
        let third = TaskStore::new(Arc::new(MemoryBlobStore::new()));
        assert_eq!(third.import_json(&bare).await.unwrap(), 2);

        assert!(matches!(
            third.import_json("{\"nope\": true}").await,
            Err(StoreError::InvalidImport(_))
        ));
        assert_eq!(third.len(), 2);
    }
}

//! Mock implementation of Storage trait for testing

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::info;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::storage::naming::validate_storage_name;
use crate::storage::{Locator, Storage, StorageError, StoredFile};

struct MockEntry {
    data: Bytes,
    mime_type: String,
    created_at: DateTime<Utc>,
}

/// In-memory storage keyed by storage name
pub struct MockFileStore {
    entries: Arc<Mutex<HashMap<String, MockEntry>>>,
    // Number of further puts allowed to succeed; usize::MAX disables failures
    puts_before_failure: AtomicUsize,
}

impl MockFileStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            puts_before_failure: AtomicUsize::new(usize::MAX),
        }
    }

    /// Let the next `n` puts succeed and fail every put after that
    pub fn fail_puts_after(&self, n: usize) {
        self.puts_before_failure.store(n, Ordering::SeqCst);
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MockEntry>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_put_permit(&self) -> bool {
        self.puts_before_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }

    fn locator(name: &str) -> Locator {
        Locator::Url(format!("memory:///{}", name))
    }
}

impl Default for MockFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MockFileStore {
    fn kind(&self) -> &'static str {
        "mock"
    }

    async fn put(&self, name: &str, data: Bytes, mime_type: &str) -> Result<StoredFile, StorageError> {
        let name = validate_storage_name(name)?;
        if !self.take_put_permit() {
            return Err(StorageError::Unavailable("mock store rejected write".to_string()));
        }
        let created_at = Utc::now();
        let size = data.len() as u64;
        self.lock().insert(
            name.to_string(),
            MockEntry {
                data,
                mime_type: mime_type.to_string(),
                created_at,
            },
        );
        info!("Mock: stored {} with size {}", name, size);
        Ok(StoredFile::new(name, Some(mime_type), size, created_at, Self::locator(name)))
    }

    async fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        Ok(self
            .lock()
            .iter()
            .map(|(name, entry)| {
                StoredFile::new(
                    name,
                    Some(&entry.mime_type),
                    entry.data.len() as u64,
                    entry.created_at,
                    Self::locator(name),
                )
            })
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        let name = validate_storage_name(name)?;
        self.lock()
            .get(name)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let name = validate_storage_name(name)?;
        match self.lock().remove(name) {
            Some(_) => {
                info!("Mock: deleted {}", name);
                Ok(())
            }
            None => Err(StorageError::NotFound(name.to_string())),
        }
    }

    async fn delete_all(&self) -> Result<usize, StorageError> {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store_operations() {
        let store = MockFileStore::new();
        store.put("1-1-a.txt", Bytes::from_static(b"abc"), "text/plain").await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1-1-a.txt").await.unwrap(), Bytes::from_static(b"abc"));

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].mime_type, "text/plain");
        assert_eq!(listed[0].locator, Locator::Url("memory:///1-1-a.txt".to_string()));

        store.delete("1-1-a.txt").await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.delete("1-1-a.txt").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fail_puts_after() {
        let store = MockFileStore::new();
        store.fail_puts_after(1);
        assert!(store.put("1-1-ok.txt", Bytes::new(), "text/plain").await.is_ok());
        assert!(matches!(
            store.put("1-2-no.txt", Bytes::new(), "text/plain").await,
            Err(StorageError::Unavailable(_))
        ));
        assert_eq!(store.len(), 1);
    }
}

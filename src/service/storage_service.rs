//! Storage service layer that provides a clean interface to the storage abstraction

use bytes::Bytes;
use log::{error, info, warn};
use std::sync::Arc;

use crate::service::IncomingFile;
use crate::storage::naming::{generate_storage_name, original_name, validate_storage_name};
use crate::storage::{Storage, StorageError, StoredFile};

/// Storage service that turns handler requests into backend calls
///
/// Holds no state of its own: the backend is the only source of truth for
/// what is stored. A bulk clear racing with an upload may miss or remove the
/// new entry; nothing here coordinates the two.
pub struct StorageService {
    storage: Arc<dyn Storage>,
}

impl StorageService {
    /// Create a new storage service with injected storage backend
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn backend_kind(&self) -> &'static str {
        self.storage.kind()
    }

    /// Persist every file under a fresh storage name.
    ///
    /// If any write fails, the files already written by this call are removed
    /// again and the first error is returned.
    pub async fn store_files(&self, files: Vec<IncomingFile>) -> Result<Vec<StoredFile>, StorageError> {
        let mut stored: Vec<StoredFile> = Vec::with_capacity(files.len());
        for file in files {
            let name = generate_storage_name(&file.original_name);
            match self.storage.put(&name, file.data, &file.mime_type).await {
                Ok(entry) => stored.push(entry),
                Err(e) => {
                    error!(
                        "Failed to store {} on {} backend: {}; rolling back {} file(s)",
                        file.original_name,
                        self.storage.kind(),
                        e,
                        stored.len()
                    );
                    self.rollback(&stored).await;
                    return Err(e);
                }
            }
        }
        info!("Stored {} file(s) on {} backend", stored.len(), self.storage.kind());
        Ok(stored)
    }

    async fn rollback(&self, stored: &[StoredFile]) {
        for entry in stored {
            if let Err(e) = self.storage.delete(&entry.storage_name).await {
                warn!("Rollback could not remove {}: {}", entry.storage_name, e);
            }
        }
    }

    pub async fn list_files(&self) -> Result<Vec<StoredFile>, StorageError> {
        self.storage.list().await
    }

    /// Fetch one entry, returning its original name alongside the bytes
    pub async fn fetch_file(&self, name: &str) -> Result<(String, Bytes), StorageError> {
        let name = validate_storage_name(name)?;
        let data = self.storage.get(name).await?;
        Ok((original_name(name).to_string(), data))
    }

    pub async fn remove_file(&self, name: &str) -> Result<(), StorageError> {
        let name = validate_storage_name(name)?;
        self.storage.delete(name).await
    }

    /// Remove every entry and report how many were removed
    pub async fn clear_files(&self) -> Result<usize, StorageError> {
        self.storage.delete_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mock_store::MockFileStore;

    fn incoming(name: &str, data: &'static [u8]) -> IncomingFile {
        IncomingFile {
            original_name: name.to_string(),
            mime_type: "text/plain".to_string(),
            data: Bytes::from_static(data),
        }
    }

    #[tokio::test]
    async fn test_store_files_assigns_unique_names() {
        let service = StorageService::new(Arc::new(MockFileStore::new()));
        let stored = service
            .store_files(vec![incoming("same.txt", b"one"), incoming("same.txt", b"two")])
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_ne!(stored[0].storage_name, stored[1].storage_name);
        assert!(stored.iter().all(|f| f.original_name == "same.txt"));

        let (name, data) = service.fetch_file(&stored[1].storage_name).await.unwrap();
        assert_eq!(name, "same.txt");
        assert_eq!(data, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_failed_upload_rolls_back() {
        let store = Arc::new(MockFileStore::new());
        store.fail_puts_after(2);
        let service = StorageService::new(store.clone());

        let result = service
            .store_files(vec![incoming("a.txt", b"a"), incoming("b.txt", b"b"), incoming("c.txt", b"c")])
            .await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_in_original_name_stays_inside_root() {
        let service = StorageService::new(Arc::new(MockFileStore::new()));
        let stored = service.store_files(vec![incoming("../../etc/passwd", b"x")]).await.unwrap();
        assert!(stored[0].storage_name.ends_with("-passwd"));
        assert_eq!(stored[0].original_name, "passwd");
    }

    #[tokio::test]
    async fn test_rejects_invalid_names() {
        let service = StorageService::new(Arc::new(MockFileStore::new()));
        assert!(matches!(service.fetch_file("../x").await, Err(StorageError::InvalidName(_))));
        assert!(matches!(service.remove_file("..").await, Err(StorageError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_clear_files_is_idempotent() {
        let service = StorageService::new(Arc::new(MockFileStore::new()));
        service.store_files(vec![incoming("a.txt", b"a")]).await.unwrap();
        assert_eq!(service.clear_files().await.unwrap(), 1);
        assert_eq!(service.clear_files().await.unwrap(), 0);
    }
}

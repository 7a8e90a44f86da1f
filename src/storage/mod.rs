//! File Storage Layer Abstraction
//!
//! This module provides an abstraction over the media uploaded files live on,
//! allowing handlers to work the same way whether entries sit in a project
//! directory, in the platform scratch directory, or in a managed object store.

pub mod blob_store;
pub mod config;
pub mod local_store;
pub mod mock_store;
pub mod naming;
pub mod retry;


use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Content type recorded when an upload does not declare one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// No entry is stored under the requested name
    #[error("file not found: {0}")]
    NotFound(String),
    /// The requested name cannot address an entry inside the storage root
    #[error("invalid file name: {0}")]
    InvalidName(String),
    /// The underlying medium failed (disk, permissions, network, configuration)
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::Unavailable(other.to_string()),
        }
    }
}

/// Backend-specific address of a stored entry
///
/// Only valid while the entry exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Absolute or root-relative path on a local filesystem
    Path(PathBuf),
    /// Fetchable URL of a remote object
    Url(String),
}

/// Metadata describing one persisted upload
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    /// Unique name the entry is stored under (`<timestamp>-<random>-<original>`)
    pub storage_name: String,
    /// Name the client supplied, after sanitising
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub locator: Locator,
}

impl StoredFile {
    /// Build a record for `storage_name`, recovering the original name from it
    pub fn new(
        storage_name: &str,
        mime_type: Option<&str>,
        size_bytes: u64,
        created_at: DateTime<Utc>,
        locator: Locator,
    ) -> Self {
        let mime_type = match mime_type {
            Some(m) if !m.trim().is_empty() => m.to_string(),
            _ => naming::guess_mime_type(storage_name),
        };
        Self {
            storage_name: storage_name.to_string(),
            original_name: naming::original_name(storage_name).to_string(),
            mime_type,
            size_bytes,
            created_at,
            locator,
        }
    }
}

/// Trait defining the file storage interface shared by every backend
///
/// Implementations must never leave a partially written entry addressable:
/// `put` either makes the complete entry visible or fails without registering it.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend label used in logs
    fn kind(&self) -> &'static str;

    /// Persist `data` under `name` and return the resulting metadata
    async fn put(&self, name: &str, data: Bytes, mime_type: &str) -> Result<StoredFile, StorageError>;

    /// Enumerate every stored entry in backend order; an absent storage area is empty
    async fn list(&self) -> Result<Vec<StoredFile>, StorageError>;

    /// Read the full contents of one entry
    async fn get(&self, name: &str) -> Result<Bytes, StorageError>;

    /// Remove one entry
    async fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Remove every entry and report how many were removed
    async fn delete_all(&self) -> Result<usize, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_file_recovers_original_name() {
        let file = StoredFile::new(
            "1700000000000-42-report.pdf",
            None,
            10,
            Utc::now(),
            Locator::Path(PathBuf::from("uploads/1700000000000-42-report.pdf")),
        );
        assert_eq!(file.original_name, "report.pdf");
        assert_eq!(file.mime_type, "application/pdf");
    }

    #[test]
    fn test_stored_file_keeps_declared_mime_type() {
        let file = StoredFile::new(
            "1-2-notes.txt",
            Some("text/markdown"),
            0,
            Utc::now(),
            Locator::Url("memory:///1-2-notes.txt".to_string()),
        );
        assert_eq!(file.mime_type, "text/markdown");

        let blank = StoredFile::new("1-2-blob", Some("  "), 0, Utc::now(), Locator::Url(String::new()));
        assert_eq!(blank.mime_type, DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_object_store_not_found_maps_to_not_found() {
        let err = object_store::Error::NotFound {
            path: "missing".to_string(),
            source: "gone".into(),
        };
        assert!(matches!(StorageError::from(err), StorageError::NotFound(p) if p == "missing"));
    }
}

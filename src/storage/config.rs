//! Configuration for file storage backends

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

use crate::storage::blob_store::BlobFileStore;
use crate::storage::local_store::LocalFileStore;
use crate::storage::mock_store::MockFileStore;
use crate::storage::retry::RetryConfig;
use crate::storage::{Storage, StorageError};

/// Available storage backends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory relative to the working directory
    #[default]
    Local,
    /// Directory under the platform temp dir
    Temp,
    /// Managed object store
    Blob,
    /// In-memory, for tests
    Mock,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "localfs" => Ok(StorageBackend::Local),
            "temp" | "tmp" => Ok(StorageBackend::Temp),
            "blob" | "remote" | "s3" => Ok(StorageBackend::Blob),
            "mock" => Ok(StorageBackend::Mock),
            _ => Err(format!("Unknown storage backend: {}", s)),
        }
    }
}

/// Remote blob store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlobConfig {
    /// Object store URL, e.g. `s3://bucket/uploads` or `file:///srv/uploads`
    pub url: String,
    /// Prefix used for client-facing URLs instead of `url`
    pub public_base_url: Option<String>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            url: "memory:///".to_string(),
            public_base_url: None,
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root of the local backend
    pub base_path: String,
    /// Directory name joined onto the platform temp dir for the temp backend
    pub temp_subdir: String,
    pub blob: BlobConfig,
    /// Retry policy for blob store calls
    pub retry: RetryConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            base_path: "./public/uploads".to_string(),
            temp_subdir: "uploads".to_string(),
            blob: BlobConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Apply `STORAGE_BACKEND`, `STORAGE_DIRECTORY` and `BLOB_STORE_URL` overrides
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("STORAGE_BACKEND") {
            match backend_str.parse::<StorageBackend>() {
                Ok(backend) => {
                    info!("Using storage backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => warn!("{}. Keeping {:?}.", e, self.backend),
            }
        }
        if let Ok(dir) = env::var("STORAGE_DIRECTORY") {
            info!("Using storage directory from environment: {}", dir);
            self.base_path = dir;
        }
        if let Ok(url) = env::var("BLOB_STORE_URL") {
            info!("Using blob store url from environment: {}", url);
            self.blob.url = url;
        }
    }

    /// Create a storage instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn Storage>, StorageError> {
        let store: Arc<dyn Storage> = match self.backend {
            StorageBackend::Local => Arc::new(LocalFileStore::new(&self.base_path)),
            StorageBackend::Temp => Arc::new(LocalFileStore::temporary(&self.temp_subdir)),
            StorageBackend::Blob => Arc::new(BlobFileStore::new(&self.blob, self.retry.clone())?),
            StorageBackend::Mock => Arc::new(MockFileStore::new()),
        };
        Ok(store)
    }
}

//! Application State Management
//!
//! This module provides the application state that contains all services
//! and their dependencies, following the dependency injection pattern.

use log::info;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::service::storage_service::StorageService;
use crate::storage::mock_store::MockFileStore;
use crate::storage::{Storage, StorageError};

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub storage_service: Arc<StorageService>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> Result<Self, StorageError> {
        info!("Initializing application state with configuration");
        let storage_backend = config.storage.create_store()?;
        info!("Using {} storage backend", storage_backend.kind());
        Ok(Self::with_storage(storage_backend, config))
    }

    /// Create application state around an already constructed backend
    pub fn with_storage(storage_backend: Arc<dyn Storage>, config: AppConfig) -> Self {
        Self {
            storage_service: Arc::new(StorageService::new(storage_backend)),
            config,
        }
    }

    /// Create application state for testing with the in-memory backend
    pub fn new_for_testing() -> Self {
        Self::with_storage(Arc::new(MockFileStore::new()), AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::StorageBackend;

    #[test]
    fn test_from_config_selects_backend() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Mock;
        let state = AppState::from_config(config).unwrap();
        assert_eq!(state.storage_service.backend_kind(), "mock");
    }

    #[test]
    fn test_from_config_reports_bad_blob_url() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Blob;
        config.storage.blob.url = "::nonsense".to_string();
        assert!(AppState::from_config(config).is_err());
    }

    #[test]
    fn test_new_for_testing() {
        let state = AppState::new_for_testing();
        assert_eq!(state.storage_service.backend_kind(), "mock");
    }
}

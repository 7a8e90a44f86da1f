//! Local filesystem storage implementation
//!
//! Serves both the project-directory variant and the temporary-directory
//! variant; they differ only in where the root lives.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::storage::naming::validate_storage_name;
use crate::storage::{Locator, Storage, StorageError, StoredFile};

/// Directory inside the root where uploads are written before becoming visible
const STAGING_DIR: &str = ".staging";

/// Files stored as plain entries directly under a root directory
pub struct LocalFileStore {
    root: PathBuf,
    kind: &'static str,
}

impl LocalFileStore {
    /// Store rooted at `root`, typically relative to the working directory.
    /// The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Using local storage directory: {}", root.display());
        Self { root, kind: "local" }
    }

    /// Store rooted at `<platform temp dir>/<subdir>`.
    /// Entries are not expected to survive a restart.
    pub fn temporary(subdir: &str) -> Self {
        Self::temporary_in(std::env::temp_dir(), subdir)
    }

    /// Temporary store under an explicit scratch directory
    pub fn temporary_in(scratch: impl AsRef<Path>, subdir: &str) -> Self {
        let root = scratch.as_ref().join(subdir);
        info!("Using temporary storage directory: {}", root.display());
        Self { root, kind: "temp" }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `name` to a path that is guaranteed to sit directly under the root
    fn entry_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let name = validate_storage_name(name)?;
        let path = self.root.join(name);
        if path.parent() != Some(self.root.as_path()) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(path)
    }

    /// Metadata for `name`, read from `source` and addressed at `location`
    async fn describe(
        &self,
        name: &str,
        source: &Path,
        location: &Path,
        mime_type: Option<&str>,
    ) -> Result<StoredFile, StorageError> {
        let meta = fs::metadata(source).await?;
        let created = meta.created().or_else(|_| meta.modified())?;
        Ok(StoredFile::new(
            name,
            mime_type,
            meta.len(),
            DateTime::<Utc>::from(created),
            Locator::Path(location.to_path_buf()),
        ))
    }
}

#[async_trait]
impl Storage for LocalFileStore {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn put(&self, name: &str, data: Bytes, mime_type: &str) -> Result<StoredFile, StorageError> {
        let target = self.entry_path(name)?;
        let staging_dir = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging_dir).await?;

        // Write and describe the payload out of sight; only a complete entry is renamed into place
        let staged = staging_dir.join(name);
        let stored = match fs::write(&staged, &data).await {
            Ok(()) => self.describe(name, &staged, &target, Some(mime_type)).await,
            Err(e) => Err(e.into()),
        };
        let stored = match stored {
            Ok(file) => fs::rename(&staged, &target).await.map(|()| file).map_err(StorageError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = &stored {
            warn!("Failed to store {} in {}: {}", name, self.root.display(), e);
            let _ = fs::remove_file(&staged).await;
            return stored;
        }

        info!("Stored {} ({} bytes) in {}", name, data.len(), self.root.display());
        stored
    }

    async fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Storage directory {} does not exist yet", self.root.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if validate_storage_name(&name).is_err() {
                continue;
            }
            let path = entry.path();
            match self.describe(&name, &path, &path, None).await {
                Ok(file) => files.push(file),
                // Removed between enumeration and stat
                Err(StorageError::Unavailable(msg)) if !path.exists() => {
                    debug!("Skipping vanished entry {}: {}", name, msg);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(files)
    }

    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        let path = self.entry_path(name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.entry_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted {} from {}", name, self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self) -> Result<usize, StorageError> {
        let mut deleted = 0;
        for file in self.list().await? {
            match self.delete(&file.storage_name).await {
                Ok(()) => deleted += 1,
                Err(StorageError::NotFound(name)) => warn!("{} disappeared before it could be deleted", name),
                Err(e) => return Err(e),
            }
        }
        info!("Cleared {} file(s) from {}", deleted, self.root.display());
        Ok(deleted)
    }
}

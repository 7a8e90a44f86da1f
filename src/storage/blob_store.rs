//! Remote blob store implementation backed by `object_store`
//!
//! Any store `object_store` can reach through a URL works here (`s3://`,
//! `file://`, `memory://`). Medium-level calls are wrapped in the configured
//! retry policy.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::TryStreamExt;
use log::{info, warn};
use object_store::{
    aws::AmazonS3Builder, parse_url, path::Path, Attribute, Attributes, ObjectMeta, ObjectStore,
    ObjectStoreScheme, PutOptions, PutPayload,
};
use std::env;
use std::sync::Arc;
use url::Url;

use crate::storage::config::BlobConfig;
use crate::storage::naming::validate_storage_name;
use crate::storage::retry::{with_retry, RetryConfig};
use crate::storage::{Locator, Storage, StorageError, StoredFile};

/// Files stored as objects under a prefix of an object store
pub struct BlobFileStore {
    object_store: Arc<dyn ObjectStore>,
    prefix: Path,
    base_url: String,
    // The local filesystem store refuses object attributes
    store_content_type: bool,
    retry: RetryConfig,
}

impl BlobFileStore {
    /// Connect to the store named by `config.url`
    pub fn new(config: &BlobConfig, retry: RetryConfig) -> Result<Self, StorageError> {
        let url = Url::parse(&config.url)
            .map_err(|e| StorageError::Unavailable(format!("invalid blob store url {}: {}", config.url, e)))?;
        let (object_store, prefix, scheme) = Self::build_object_store(&url)?;
        let base_url = config.public_base_url.clone().unwrap_or_else(|| config.url.clone());
        info!("Using blob store at {} ({:?})", config.url, scheme);
        Ok(Self {
            object_store: Arc::from(object_store),
            prefix,
            base_url,
            store_content_type: scheme != ObjectStoreScheme::Local,
            retry,
        })
    }

    /// Wrap an already constructed object store
    pub fn with_object_store(object_store: Arc<dyn ObjectStore>, prefix: Path, base_url: &str, retry: RetryConfig) -> Self {
        Self {
            object_store,
            prefix,
            base_url: base_url.to_string(),
            store_content_type: true,
            retry,
        }
    }

    fn build_object_store(url: &Url) -> Result<(Box<dyn ObjectStore>, Path, ObjectStoreScheme), StorageError> {
        let (scheme, path) = ObjectStoreScheme::parse(url)
            .map_err(|e| StorageError::Unavailable(format!("unsupported blob store url {}: {}", url, e)))?;
        match scheme {
            ObjectStoreScheme::AmazonS3 => {
                let mut builder = AmazonS3Builder::from_env().with_url(url.as_str());
                // For supporting localstack/minio for testing
                if let Ok(endpoint) = env::var("AWS_ENDPOINT_URL") {
                    if endpoint.starts_with("http://") {
                        builder = builder.with_allow_http(true);
                    }
                    builder = builder.with_endpoint(endpoint);
                }
                Ok((Box::new(builder.build()?), path, scheme))
            }
            _ => {
                let (store, path) = parse_url(url)?;
                Ok((store, path, scheme))
            }
        }
    }

    fn object_path(&self, name: &str) -> Result<Path, StorageError> {
        let name = validate_storage_name(name)?;
        Ok(self.prefix.child(name))
    }

    fn locator(&self, name: &str) -> Locator {
        let url = match Url::parse(&self.base_url) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push(name);
                }
                url.to_string()
            }
            Err(_) => format!("{}/{}", self.base_url.trim_end_matches('/'), name),
        };
        Locator::Url(url)
    }

    fn direct_child_name<'a>(&self, meta: &'a ObjectMeta) -> Option<&'a str> {
        let depth = meta.location.prefix_match(&self.prefix)?.count();
        if depth != 1 {
            return None;
        }
        let name = meta.location.filename()?;
        validate_storage_name(name).ok()
    }
}

#[async_trait]
impl Storage for BlobFileStore {
    fn kind(&self) -> &'static str {
        "blob"
    }

    async fn put(&self, name: &str, data: Bytes, mime_type: &str) -> Result<StoredFile, StorageError> {
        let path = self.object_path(name)?;
        let size = data.len() as u64;
        with_retry(&self.retry, "blob put", || {
            let store = self.object_store.clone();
            let path = path.clone();
            let payload = PutPayload::from(data.clone());
            let mut attributes = Attributes::new();
            if self.store_content_type {
                attributes.insert(Attribute::ContentType, mime_type.to_string().into());
            }
            let opts = PutOptions {
                attributes,
                ..Default::default()
            };
            async move {
                store.put_opts(&path, payload, opts).await?;
                Ok::<_, StorageError>(())
            }
        })
        .await?;
        info!("Stored blob {} ({} bytes)", path, size);
        Ok(StoredFile::new(name, Some(mime_type), size, Utc::now(), self.locator(name)))
    }

    async fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        // The listing stream follows continuation tokens until the store is exhausted
        let metas: Vec<ObjectMeta> = with_retry(&self.retry, "blob list", || {
            let store = self.object_store.clone();
            let prefix = self.prefix.clone();
            async move {
                let scope = if prefix.as_ref().is_empty() { None } else { Some(&prefix) };
                let metas = store.list(scope).try_collect::<Vec<_>>().await?;
                Ok::<_, StorageError>(metas)
            }
        })
        .await?;

        Ok(metas
            .iter()
            .filter_map(|meta| {
                let name = self.direct_child_name(meta)?;
                Some(StoredFile::new(
                    name,
                    None,
                    meta.size as u64,
                    meta.last_modified,
                    self.locator(name),
                ))
            })
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(name)?;
        with_retry(&self.retry, "blob get", || {
            let store = self.object_store.clone();
            let path = path.clone();
            async move {
                let result = store.get(&path).await?;
                Ok::<_, StorageError>(result.bytes().await?)
            }
        })
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) => StorageError::NotFound(name.to_string()),
            other => other,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.object_path(name)?;
        // Some stores treat deleting a missing key as success
        with_retry(&self.retry, "blob delete", || {
            let store = self.object_store.clone();
            let path = path.clone();
            async move {
                store.head(&path).await?;
                store.delete(&path).await?;
                Ok::<_, StorageError>(())
            }
        })
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) => StorageError::NotFound(name.to_string()),
            other => other,
        })?;
        info!("Deleted blob {}", path);
        Ok(())
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
        info!("Cleared {} blob(s) under {}", deleted, self.base_url);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn memory_store(prefix: &str) -> (BlobFileStore, Arc<InMemory>) {
        let inner = Arc::new(InMemory::new());
        let store = BlobFileStore::with_object_store(
            inner.clone(),
            Path::from(prefix),
            "https://blobs.example.com/uploads",
            RetryConfig::none(),
        );
        (store, inner)
    }

    #[tokio::test]
    async fn test_blob_store_round_trip() {
        let (store, _) = memory_store("uploads");
        let stored = store
            .put("1-2-photo.png", Bytes::from_static(b"\x89PNG"), "image/png")
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 4);
        assert_eq!(
            stored.locator,
            Locator::Url("https://blobs.example.com/uploads/1-2-photo.png".to_string())
        );
        assert_eq!(store.get("1-2-photo.png").await.unwrap(), Bytes::from_static(b"\x89PNG"));

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].original_name, "photo.png");
        assert_eq!(listed[0].mime_type, "image/png");

        store.delete("1-2-photo.png").await.unwrap();
        assert!(matches!(store.get("1-2-photo.png").await, Err(StorageError::NotFound(n)) if n == "1-2-photo.png"));
    }

    #[tokio::test]
    async fn test_content_type_is_stored_as_attribute() {
        let (store, inner) = memory_store("uploads");
        store.put("1-1-doc", Bytes::from_static(b"{}"), "application/json").await.unwrap();
        let result = inner.get(&Path::from("uploads/1-1-doc")).await.unwrap();
        let content_type: Option<&str> = result.attributes.get(&Attribute::ContentType).map(AsRef::as_ref);
        assert_eq!(content_type, Some("application/json"));
    }

    #[tokio::test]
    async fn test_list_ignores_nested_and_foreign_objects() {
        let (store, inner) = memory_store("uploads");
        store.put("1-1-a.txt", Bytes::from_static(b"a"), "text/plain").await.unwrap();
        inner
            .put(&Path::from("uploads/nested/1-2-b.txt"), PutPayload::from_static(b"b"))
            .await
            .unwrap();
        inner
            .put(&Path::from("other/1-3-c.txt"), PutPayload::from_static(b"c"))
            .await
            .unwrap();

        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|f| f.storage_name).collect();
        assert_eq!(names, vec!["1-1-a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_missing_blob_is_not_found() {
        let (store, _) = memory_store("");
        assert!(matches!(store.delete("1-1-ghost.txt").await, Err(StorageError::NotFound(_))));
        assert_eq!(store.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_root_prefix_lists_top_level_objects() {
        let (store, _) = memory_store("");
        store.put("1-1-x.bin", Bytes::from_static(b"x"), "application/octet-stream").await.unwrap();
        store.put("1-2-y.bin", Bytes::from_static(b"y"), "application/octet-stream").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_new_from_memory_url() {
        let config = BlobConfig {
            url: "memory:///".to_string(),
            public_base_url: None,
        };
        let store = BlobFileStore::new(&config, RetryConfig::none()).unwrap();
        assert_eq!(store.kind(), "blob");
    }

    #[test]
    fn test_new_rejects_garbage_url() {
        let config = BlobConfig {
            url: "not a url".to_string(),
            public_base_url: None,
        };
        assert!(matches!(
            BlobFileStore::new(&config, RetryConfig::none()),
            Err(StorageError::Unavailable(_))
        ));
    }
}

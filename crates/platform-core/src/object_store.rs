//! Artifact/object store abstraction (§1 "out of scope", §4.4, §6).
//!
//! The real engine (S3-compatible, configured via `OBJECT_STORE_*`) is an
//! external collaborator; only the narrow interface is specified here. Two
//! adapters are provided: an in-memory double for tests and a filesystem
//! adapter for local/dev runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::ObjectStoreError;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    async fn get(&self, key: &str) -> Result<StoredObject, ObjectStoreError>;

    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_ok()
    }
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, StoredObject>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, ObjectStoreError> {
        self.objects
            .get(key)
            .map(|entry| entry.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }
}

/// Filesystem-backed adapter, laid out exactly as the artifact key implies
/// (`sites/{tenantId}/{siteId}/{version}/...`), for local/dev runs without a
/// real object-store endpoint.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }

    fn meta_path_for(&self, key: &str) -> PathBuf {
        let mut path = self.path_for(key).into_os_string();
        path.push(".meta");
        PathBuf::from(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::Io(e.to_string()))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ObjectStoreError::Io(e.to_string()))?;
        tokio::fs::write(self.meta_path_for(key), content_type.as_bytes())
            .await
            .map_err(|e| ObjectStoreError::Io(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, ObjectStoreError> {
        let path = self.path_for(key);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| ObjectStoreError::NotFound(key.to_string()))?;
        let content_type = tokio::fs::read_to_string(self.meta_path_for(key))
            .await
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    async fn exists(&self, key: &str) -> bool {
        tokio::fs::metadata(self.path_for(key)).await.is_ok()
    }
}

pub fn join_key(prefix: &str, path: &str) -> String {
    format!("{}{}", prefix.trim_end_matches('/'), path)
}

pub fn ensure_under(root: &Path, key: &str) -> bool {
    !key.contains("..") && !Path::new(key).is_absolute() && root.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_put_get_roundtrip() {
        let store = InMemoryObjectStore::new();
        store
            .put("sites/t/s/1/index.html", b"<html></html>".to_vec(), "text/html")
            .await
            .unwrap();
        let obj = store.get("sites/t/s/1/index.html").await.unwrap();
        assert_eq!(obj.bytes, b"<html></html>");
        assert_eq!(obj.content_type, "text/html");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = InMemoryObjectStore::new();
        assert!(store.get("missing").await.is_err());
    }

    #[tokio::test]
    async fn fs_store_roundtrips_through_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        store
            .put("sites/t/s/1/about/index.html", b"hi".to_vec(), "text/html")
            .await
            .unwrap();
        let obj = store.get("sites/t/s/1/about/index.html").await.unwrap();
        assert_eq!(obj.bytes, b"hi");
    }
}

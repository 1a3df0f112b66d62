//! On-disk cache store.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/<hex(namespace)>/<sha256(method url)>.entry
//! ```
//!
//! Namespace directory names are hex encoded so any namespace string is a
//! valid directory name. Entries are JSON and are written to a temporary file
//! first, then renamed into place, so a concurrent `get` sees either the old
//! or the new response and never a torn write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::entry::{CacheEntry, CachedResponse, RequestKey};
use crate::cache::store::{CacheError, CacheStore, NamespaceHandle};

const ENTRY_EXT: &str = "entry";

pub struct DiskCacheStore {
    root: PathBuf,
}

impl DiskCacheStore {
    /// Create a disk store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(hex::encode(namespace.as_bytes()))
    }

    fn entry_path(&self, namespace: &str, key: &RequestKey) -> PathBuf {
        let digest = Sha256::digest(key.to_string().as_bytes());
        self.namespace_dir(namespace)
            .join(format!("{}.{ENTRY_EXT}", hex::encode(digest)))
    }
}

/// Write `data` to `tmp`, then rename it over `path`. The temporary file is
/// removed on any failure, including a partial write.
async fn write_atomic(tmp: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    let result = match fs::write(tmp, data).await {
        Ok(()) => fs::rename(tmp, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        if let Err(e) = fs::remove_file(tmp).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %e, "Could not remove temporary entry");
            }
        }
    }
    result
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    async fn open(&self, namespace: &str) -> Result<NamespaceHandle, CacheError> {
        fs::create_dir_all(self.namespace_dir(namespace)).await?;
        Ok(NamespaceHandle::new(namespace))
    }

    async fn get(
        &self,
        handle: &NamespaceHandle,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let path = self.entry_path(handle.name(), key);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry = serde_json::from_slice(&data)
            .map_err(|source| CacheError::Corrupt { path, source })?;

        // Two identities hashing to the same file would be a SHA-256 collision;
        // treat a mismatch as a miss rather than serving the wrong response.
        if entry.key != *key {
            warn!(key = %key, stored = %entry.key, "Entry identity mismatch");
            return Ok(None);
        }
        Ok(Some(entry.response))
    }

    async fn put(
        &self,
        handle: &NamespaceHandle,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        let dir = self.namespace_dir(handle.name());
        if !fs::try_exists(&dir).await? {
            return Err(CacheError::UnknownNamespace(handle.name().to_string()));
        }

        let path = self.entry_path(handle.name(), &key);
        let data = serde_json::to_vec(&CacheEntry::new(key.clone(), response))?;

        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        write_atomic(&tmp, &path, &data).await?;

        debug!(namespace = %handle, key = %key, bytes = data.len(), "Wrote entry");
        Ok(())
    }

    async fn remove(&self, handle: &NamespaceHandle, key: &RequestKey) -> Result<bool, CacheError> {
        match fs::remove_file(self.entry_path(handle.name(), key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            let raw = item.file_name();
            let decoded = raw
                .to_str()
                .and_then(|s| hex::decode(s).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            match decoded {
                Some(name) => names.push(name),
                None => warn!(dir = ?raw, "Skipping foreign directory in cache root"),
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        match fs::remove_dir_all(self.namespace_dir(namespace)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn entry_count(&self, namespace: &str) -> Result<usize, CacheError> {
        let mut dir = match fs::read_dir(self.namespace_dir(namespace)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut count = 0;
        while let Some(item) = dir.next_entry().await? {
            if item.path().extension().is_some_and(|ext| ext == ENTRY_EXT) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let key = RequestKey::get("/static/icon.png?v=2");

        {
            let store = DiskCacheStore::new(dir.path()).await.unwrap();
            let ns = store.open("app-static-v1").await.unwrap();
            let resp = CachedResponse::new(200)
                .with_header("Content-Type", "image/png")
                .with_body(vec![0x89, b'P', b'N', b'G']);
            store.put(&ns, key.clone(), resp).await.unwrap();
        }

        let store = DiskCacheStore::new(dir.path()).await.unwrap();
        let ns = store.open("app-static-v1").await.unwrap();
        let got = store.get(&ns, &key).await.unwrap().unwrap();
        assert_eq!(got.header("content-type"), Some("image/png"));
        assert_eq!(got.body.as_ref(), &[0x89, b'P', b'N', b'G']);
        assert_eq!(store.entry_count("app-static-v1").await.unwrap(), 1);

        assert!(store.remove(&ns, &key).await.unwrap());
        assert!(store.get(&ns, &key).await.unwrap().is_none());
        assert!(!store.remove(&ns, &key).await.unwrap());
    }

    #[tokio::test]
    async fn test_namespace_names_round_trip_through_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::new(dir.path()).await.unwrap();
        store.open("app/v1").await.unwrap();
        store.open("app-v2").await.unwrap();
        std::fs::create_dir(dir.path().join("not-hex")).unwrap();

        assert_eq!(store.list_namespaces().await.unwrap(), vec!["app-v2", "app/v1"]);

        assert!(store.delete_namespace("app/v1").await.unwrap());
        assert!(!store.delete_namespace("app/v1").await.unwrap());
        assert_eq!(store.list_namespaces().await.unwrap(), vec!["app-v2"]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join(".entry.tmp");

        // Rename onto a non-empty directory fails after the temp file exists.
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();
        assert!(write_atomic(&tmp, &target, b"data").await.is_err());
        assert!(!tmp.exists());

        // Writing into a missing directory fails before anything is created.
        let orphan = dir.path().join("gone").join(".entry.tmp");
        assert!(write_atomic(&orphan, &dir.path().join("e"), b"data").await.is_err());
        assert!(!orphan.exists());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::new(dir.path()).await.unwrap();
        let ns = store.open("app-v1").await.unwrap();
        assert!(store.get(&ns, &RequestKey::get("/nope")).await.unwrap().is_none());
    }
}

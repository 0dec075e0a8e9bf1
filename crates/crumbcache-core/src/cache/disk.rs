//! On-disk cache storage.
//!
//! Layout under the root directory:
//!
//! ```text
//! caches.json                 partition names, oldest first
//! <partition>/index.json      entry metadata (key, status, headers, cached_at)
//! <partition>/<sha256>.body   raw body bytes, named by the hashed key
//! ```
//!
//! Every file is written to a temp path and renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::storage::validate_partition_name;
use super::{CacheEntry, CacheError, CacheStorage, RequestKey};
use crate::net::Response;

/// Partition list file name
const PARTITIONS_FILE: &str = "caches.json";

/// Per-partition index file name
const INDEX_FILE: &str = "index.json";

pub struct DiskStorage {
    root: PathBuf,
    /// Serializes every read-modify-write of the index files.
    lock: Mutex<()>,
}

impl DiskStorage {
    pub async fn new(root: PathBuf) -> Result<Self, CacheError> {
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partitions_path(&self) -> PathBuf {
        self.root.join(PARTITIONS_FILE)
    }

    fn partition_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.partition_dir(name).join(INDEX_FILE)
    }

    fn body_path(&self, name: &str, key: &RequestKey) -> PathBuf {
        let digest = Sha256::digest(key.to_string().as_bytes());
        self.partition_dir(name).join(format!("{}.body", hex::encode(digest)))
    }

    async fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, CacheError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CacheError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn load_partitions(&self) -> Result<Vec<String>, CacheError> {
        Self::read_json(&self.partitions_path()).await
    }

    async fn save_partitions(&self, names: &[String]) -> Result<(), CacheError> {
        let contents = serde_json::to_vec_pretty(names)?;
        Self::write_atomic(&self.partitions_path(), &contents).await
    }

    async fn load_index(&self, name: &str) -> Result<Vec<CacheEntry>, CacheError> {
        Self::read_json(&self.index_path(name)).await
    }

    async fn save_index(&self, name: &str, index: &[CacheEntry]) -> Result<(), CacheError> {
        let contents = serde_json::to_vec_pretty(index)?;
        Self::write_atomic(&self.index_path(name), &contents).await
    }

    /// Caller must hold `lock`.
    async fn open_locked(&self, name: &str) -> Result<(), CacheError> {
        validate_partition_name(name)?;
        fs::create_dir_all(self.partition_dir(name)).await?;

        let mut names = self.load_partitions().await?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
            self.save_partitions(&names).await?;
            debug!(cache = name, "Created cache partition");
        }
        Ok(())
    }

    async fn load_body(&self, name: &str, mut entry: CacheEntry) -> Result<CacheEntry, CacheError> {
        entry.response.body = fs::read(self.body_path(name, &entry.key)).await?;
        Ok(entry)
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        self.open_locked(name).await
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        let _guard = self.lock.lock().await;
        Ok(self.load_partitions().await?.iter().any(|n| n == name))
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let _guard = self.lock.lock().await;
        self.load_partitions().await
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let _guard = self.lock.lock().await;
        let mut names = self.load_partitions().await?;
        let before = names.len();
        names.retain(|n| n != name);
        if names.len() == before {
            return Ok(false);
        }

        self.save_partitions(&names).await?;
        // Names come from our own list, but a hand-edited file could hold anything.
        if validate_partition_name(name).is_ok() {
            if let Err(e) = fs::remove_dir_all(self.partition_dir(name)).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(cache = name, error = %e, "Failed to remove cache directory");
                }
            }
        }
        Ok(true)
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        self.open_locked(name).await?;

        let mut index = self.load_index(name).await?;
        let previous = index.clone();
        index.retain(|e| &e.key != key);
        let mut entry = CacheEntry::new(key.clone(), response.clone());
        // Body lives in its own file.
        entry.response.body = Vec::new();
        index.push(entry);

        // The live body is only replaced once the index describing it is saved.
        let body_path = self.body_path(name, key);
        let staged = body_path.with_extension("staged");
        fs::write(&staged, &response.body).await?;

        if let Err(e) = self.save_index(name, &index).await {
            let _ = fs::remove_file(&staged).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&staged, &body_path).await {
            let _ = fs::remove_file(&staged).await;
            if let Err(restore) = self.save_index(name, &previous).await {
                warn!(cache = name, error = %restore, "Failed to restore cache index");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<CacheEntry>, CacheError> {
        let _guard = self.lock.lock().await;
        if validate_partition_name(name).is_err() {
            return Ok(None);
        }
        let index = self.load_index(name).await?;
        match index.into_iter().find(|e| &e.key == key) {
            Some(entry) => Ok(Some(self.load_body(name, entry).await?)),
            None => Ok(None),
        }
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheEntry>, CacheError> {
        let _guard = self.lock.lock().await;
        if validate_partition_name(name).is_err() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in self.load_index(name).await? {
            entries.push(self.load_body(name, entry).await?);
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

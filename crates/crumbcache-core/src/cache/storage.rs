use async_trait::async_trait;
use thiserror::Error;

use super::{CacheEntry, RequestKey};
use crate::net::Response;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize cache index: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache partition name: {0:?}")]
    InvalidPartitionName(String),

    #[error("Cache quota exceeded writing {key} to {partition} ({used} of {limit} bytes)")]
    QuotaExceeded {
        partition: String,
        key: String,
        used: usize,
        limit: usize,
    },
}

/// Named cache partitions, the contract of platform cache storage.
///
/// Each call is atomic with respect to the key it touches. Partitions are
/// listed in creation order, which is also the order `match_any` searches.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if absent.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    async fn has(&self, name: &str) -> Result<bool, CacheError>;

    /// All partition names, oldest first.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Remove a partition and everything in it. Returns false when absent.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Store a snapshot, replacing any entry with the same key. Opens the
    /// partition if needed.
    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), CacheError>;

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Every entry in a partition, sorted by key.
    async fn entries(&self, name: &str) -> Result<Vec<CacheEntry>, CacheError>;

    /// First match across all partitions.
    async fn match_any(&self, key: &RequestKey) -> Result<Option<CacheEntry>, CacheError> {
        for name in self.keys().await? {
            if let Some(entry) = self.match_in(&name, key).await? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

/// Names double as directory names on disk, so keep them boring.
pub fn validate_partition_name(name: &str) -> Result<(), CacheError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidPartitionName(name.to_string()))
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::storage::validate_partition_name;
use super::{CacheEntry, CacheError, CacheStorage, RequestKey};
use crate::net::Response;

#[derive(Debug, Default)]
struct Partition {
    name: String,
    entries: HashMap<RequestKey, CacheEntry>,
}

impl Partition {
    fn bytes(&self) -> usize {
        self.entries.values().map(CacheEntry::size).sum()
    }
}

/// In-process cache storage. Optionally enforces a byte quota across all
/// partitions, which is how quota failures are exercised in tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    partitions: RwLock<Vec<Partition>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            partitions: RwLock::default(),
            quota_bytes: Some(quota_bytes),
        }
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        validate_partition_name(name)?;
        let mut partitions = self.partitions.write().await;
        if !partitions.iter().any(|p| p.name == name) {
            partitions.push(Partition {
                name: name.to_string(),
                entries: HashMap::new(),
            });
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.partitions.read().await.iter().any(|p| p.name == name))
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .partitions
            .read()
            .await
            .iter()
            .map(|p| p.name.clone())
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|p| p.name != name);
        Ok(partitions.len() != before)
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), CacheError> {
        validate_partition_name(name)?;
        let mut partitions = self.partitions.write().await;

        if let Some(limit) = self.quota_bytes {
            // Replacing an entry frees its old body first.
            let replaced = partitions
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| p.entries.get(key))
                .map_or(0, CacheEntry::size);
            let used: usize = partitions.iter().map(Partition::bytes).sum::<usize>() - replaced;
            if used + response.body.len() > limit {
                return Err(CacheError::QuotaExceeded {
                    partition: name.to_string(),
                    key: key.to_string(),
                    used,
                    limit,
                });
            }
        }

        let index = match partitions.iter().position(|p| p.name == name) {
            Some(i) => i,
            None => {
                partitions.push(Partition {
                    name: name.to_string(),
                    entries: HashMap::new(),
                });
                partitions.len() - 1
            }
        };

        partitions[index]
            .entries
            .insert(key.clone(), CacheEntry::new(key.clone(), response.clone()));
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self
            .partitions
            .read()
            .await
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.entries.get(key).cloned()))
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheEntry>, CacheError> {
        let partitions = self.partitions.read().await;
        let mut entries: Vec<CacheEntry> = partitions
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.entries.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

//! Shared byte cache for definition files.
//!
//! moka's sync cache is safe for concurrent access, so pipeline tasks
//! upsert without extra locking while the serving layer reads.

use std::time::Duration;

use bytes::Bytes;
use moka::sync::Cache;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("entry `{key}` is {len} bytes, over the {max}-byte cap")]
    EntryTooLarge { key: String, len: usize, max: usize },
}

/// Filename-keyed cache with TTL, size-weighed capacity, and a
/// per-entry size cap enforced on insert.
#[derive(Clone)]
pub struct DefinitionCache {
    inner: Cache<String, Bytes>,
    max_entry_bytes: usize,
}

impl DefinitionCache {
    pub fn new(capacity_bytes: u64, ttl: Duration, max_entry_bytes: usize) -> Self {
        let inner = Cache::builder()
            .weigher(|_key: &String, value: &Bytes| {
                value.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(capacity_bytes)
            .time_to_live(ttl)
            .build();
        Self { inner, max_entry_bytes }
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.inner.get(key)
    }

    /// Upsert. Oversized payloads are refused; the caller logs and
    /// moves on.
    pub fn insert(&self, key: &str, bytes: Vec<u8>) -> Result<(), CacheError> {
        if bytes.len() > self.max_entry_bytes {
            return Err(CacheError::EntryTooLarge {
                key: key.to_string(),
                len: bytes.len(),
                max: self.max_entry_bytes,
            });
        }
        self.inner.insert(key.to_string(), Bytes::from(bytes));
        Ok(())
    }
}

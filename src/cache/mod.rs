//! Fingerprint -> ScoreSet memoization with a fixed time-to-live.
//!
//! Entries expire strictly `ttl` after insertion; reads never extend them. The cache
//! is a side channel: callers treat every [`CacheError`] as a miss.

use crate::fingerprint::Fingerprint;
use crate::risk::ScoreSet;
use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &Fingerprint) -> Result<Option<ScoreSet>, CacheError>;
    async fn put(&self, key: &Fingerprint, scores: ScoreSet, ttl: Duration) -> Result<(), CacheError>;
    async fn flush(&self) -> Result<(), CacheError>;
    async fn ping(&self) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub scores: ScoreSet,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

/// Per-entry TTL, counted from the latest write.
struct InsertionTtl;

impl Expiry<String, CacheEntry> for InsertionTtl {
    fn expire_after_create(&self, _key: &String, entry: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process cache bounded by entry count; expired entries are dropped first,
/// then the least recently used.
pub struct MemoryCache {
    entries: Cache<String, CacheEntry>,
}

impl MemoryCache {
    pub const DEFAULT_CAPACITY: u64 = 100_000;

    pub fn new(capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity.max(1))
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(InsertionTtl)
            .build();
        Self { entries }
    }

    /// Approximate until pending maintenance has run.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply pending expirations and evictions now.
    pub async fn run_maintenance(&self) {
        self.entries.run_pending_tasks().await;
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &Fingerprint) -> Result<Option<ScoreSet>, CacheError> {
        Ok(self.entries.get(key.as_str()).await.map(|e| e.scores))
    }

    async fn put(&self, key: &Fingerprint, scores: ScoreSet, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            fingerprint: key.clone(),
            scores,
            inserted_at: Instant::now(),
            ttl,
        };
        self.entries.insert(key.as_str().to_string(), entry).await;
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.invalidate_all();
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

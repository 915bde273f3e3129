use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;
use moka::future::Cache;

use super::{ClipStore, StoreResult, StoredClip, validate_key};

/// Expires each entry after its own TTL, restarting the window on replace.
struct PerEntryTtl;

impl Expiry<String, StoredClip> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredClip,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredClip,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process clip store backed by a bounded `moka` cache.
pub struct MemoryClipStore {
    cache: Cache<String, StoredClip>,
}

impl MemoryClipStore {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Number of live entries (approximate, as reported by moka).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl ClipStore for MemoryClipStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let hit = self
            .cache
            .get(key)
            .await
            .filter(|clip| clip.is_valid_at(Instant::now()))
            .map(|clip| clip.bytes);
        Ok(hit)
    }

    async fn put(&self, key: &str, clip: Bytes, ttl: Duration) -> StoreResult<()> {
        validate_key(key)?;
        self.cache
            .insert(key.to_string(), StoredClip::new(clip, ttl))
            .await;
        Ok(())
    }
}

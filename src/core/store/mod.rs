//! Clip store
//!
//! Durable key → clip bytes mapping with a per-entry time-to-live. A miss and an
//! expired entry are the same outcome: `Ok(None)`.
//!
//! Two backends are provided:
//! - [`MemoryClipStore`] - bounded in-process cache (default)
//! - [`FsClipStore`] - one file per key, survives restarts

mod fs;
mod memory;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use fs::FsClipStore;
pub use memory::MemoryClipStore;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a clip store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Clip store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

/// A cached clip together with its validity window.
#[derive(Debug, Clone)]
pub struct StoredClip {
    pub bytes: Bytes,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl StoredClip {
    pub fn new(bytes: Bytes, ttl: Duration) -> Self {
        Self {
            bytes,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// An entry is valid iff `now < inserted_at + ttl`.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.inserted_at + self.ttl
    }
}

/// Contract the orchestrator relies on.
#[async_trait]
pub trait ClipStore: Send + Sync {
    /// Look up a clip. Absent or expired entries return `Ok(None)`.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Insert or replace a clip with the given time-to-live.
    async fn put(&self, key: &str, clip: Bytes, ttl: Duration) -> StoreResult<()>;
}

/// Shared store handle
pub type SharedClipStore = Arc<dyn ClipStore>;

/// Build the configured store: filesystem when a cache path is set, memory otherwise.
pub fn create_clip_store(
    cache_path: Option<&std::path::Path>,
    max_entries: u64,
) -> SharedClipStore {
    match cache_path {
        Some(path) => {
            tracing::info!("Using filesystem clip store at {}", path.display());
            Arc::new(FsClipStore::new(path))
        }
        None => {
            tracing::info!(max_entries, "Using in-memory clip store");
            Arc::new(MemoryClipStore::new(max_entries))
        }
    }
}

pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

//! Cache-or-generate orchestrator
//!
//! `acquire(slot)` returns the cached clip for a slot when one is valid, and
//! otherwise generates, caches and returns a fresh one. Concurrent callers that
//! miss the cache for the same slot share one generation: the first caller
//! registers an in-flight entry holding a shared future, everyone else awaits
//! that same future and observes the same bytes or the same error.
//!
//! Generation runs in its own task, so a caller that disconnects never cancels
//! the work other callers are waiting on. The in-flight entry is cleared by the
//! task itself after the cache write, which means a caller either sees the
//! cached clip or joins the live generation; it can never start a second one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::catalog::{PromptCatalog, SlotIndex};
use crate::core::generator::{ClipGenerator, SharedClipGenerator};
use crate::core::store::{ClipStore, SharedClipStore};

/// Result type for orchestrator operations
pub type AcquireResult<T> = Result<T, AcquireError>;

/// Failures surfaced by [`ClipOrchestrator::acquire`].
///
/// `Clone` because one outcome is handed to every caller of a shared generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// Slot index is outside the prompt catalog
    #[error("Unknown clip slot {0}")]
    UnknownSlot(SlotIndex),

    /// Generation call failed or returned a non-success response
    #[error("Clip generation failed for slot {slot}: {message}")]
    Upstream { slot: SlotIndex, message: String },

    /// Generation succeeded but produced zero bytes
    #[error("Clip generation returned empty audio for slot {0}")]
    EmptyResult(SlotIndex),
}

type Outcome = AcquireResult<Bytes>;
type SharedOutcome = Shared<BoxFuture<'static, Outcome>>;

struct InflightGeneration {
    id: u64,
    outcome: SharedOutcome,
}

type InflightMap = DashMap<SlotIndex, InflightGeneration>;

/// Clears a slot's in-flight entry when the generation task finishes or unwinds.
struct InflightGuard {
    inflight: Arc<InflightMap>,
    slot: SlotIndex,
    id: u64,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let id = self.id;
        self.inflight.remove_if(&self.slot, |_, entry| entry.id == id);
    }
}

/// Cache-or-generate orchestrator with per-slot single-flight generation
pub struct ClipOrchestrator {
    store: SharedClipStore,
    generator: SharedClipGenerator,
    catalog: Arc<PromptCatalog>,
    ttl: Duration,
    inflight: Arc<InflightMap>,
    next_generation_id: AtomicU64,
}

impl ClipOrchestrator {
    pub fn new(
        store: SharedClipStore,
        generator: SharedClipGenerator,
        catalog: Arc<PromptCatalog>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            catalog,
            ttl,
            inflight: Arc::new(DashMap::new()),
            next_generation_id: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &Arc<PromptCatalog> {
        &self.catalog
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of slots currently being generated
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Return clip bytes for `slot`, generating them on a cache miss.
    pub async fn acquire(&self, slot: SlotIndex) -> AcquireResult<Bytes> {
        let entry = self
            .catalog
            .get(slot)
            .ok_or(AcquireError::UnknownSlot(slot))?;

        if let Some(bytes) = lookup(self.store.as_ref(), slot, &entry.cache_key).await {
            debug!(slot = %slot, bytes = bytes.len(), "Clip cache hit");
            return Ok(bytes);
        }

        let outcome = self.join_or_start(slot, &entry.cache_key, &entry.prompt);
        outcome.await
    }

    /// Whether the store currently holds a valid clip for `slot`
    pub async fn is_cached(&self, slot: SlotIndex) -> bool {
        match self.catalog.cache_key(slot) {
            Some(key) => lookup(self.store.as_ref(), slot, key).await.is_some(),
            None => false,
        }
    }

    fn join_or_start(&self, slot: SlotIndex, key: &str, prompt: &str) -> SharedOutcome {
        match self.inflight.entry(slot) {
            Entry::Occupied(entry) => {
                debug!(slot = %slot, "Joining in-flight generation");
                entry.get().outcome.clone()
            }
            Entry::Vacant(entry) => {
                let id = self.next_generation_id.fetch_add(1, Ordering::Relaxed);
                let outcome = self.spawn_generation(slot, key.to_string(), prompt.to_string(), id);
                entry.insert(InflightGeneration {
                    id,
                    outcome: outcome.clone(),
                });
                outcome
            }
        }
    }

    fn spawn_generation(
        &self,
        slot: SlotIndex,
        key: String,
        prompt: String,
        id: u64,
    ) -> SharedOutcome {
        let store = Arc::clone(&self.store);
        let generator = Arc::clone(&self.generator);
        let ttl = self.ttl;
        let guard = InflightGuard {
            inflight: Arc::clone(&self.inflight),
            slot,
            id,
        };

        let task = tokio::spawn(async move {
            let outcome = generate_and_store(
                store.as_ref(),
                generator.as_ref(),
                slot,
                &key,
                &prompt,
                ttl,
            )
            .await;
            drop(guard);
            outcome
        });

        async move {
            task.await.unwrap_or_else(|e| {
                error!(slot = %slot, "Clip generation task failed: {}", e);
                Err(AcquireError::Upstream {
                    slot,
                    message: format!("generation task failed: {e}"),
                })
            })
        }
        .boxed()
        .shared()
    }
}

/// Store read; read errors degrade to a miss.
async fn lookup(store: &dyn ClipStore, slot: SlotIndex, key: &str) -> Option<Bytes> {
    match store.get(key).await {
        Ok(hit) => hit,
        Err(e) => {
            warn!(slot = %slot, key, "Clip store read failed, treating as miss: {}", e);
            None
        }
    }
}

async fn generate_and_store(
    store: &dyn ClipStore,
    generator: &dyn ClipGenerator,
    slot: SlotIndex,
    key: &str,
    prompt: &str,
    ttl: Duration,
) -> Outcome {
    // A caller that missed the cache may have lost a race with a generation
    // that has since written it.
    if let Some(bytes) = lookup(store, slot, key).await {
        return Ok(bytes);
    }

    info!(slot = %slot, key, "Cache miss, generating clip");
    let started = Instant::now();

    let bytes = generator.generate(prompt).await.map_err(|e| {
        error!(slot = %slot, "Error generating clip: {}", e);
        AcquireError::Upstream {
            slot,
            message: e.to_string(),
        }
    })?;

    if bytes.is_empty() {
        warn!(slot = %slot, "Generator returned empty audio");
        return Err(AcquireError::EmptyResult(slot));
    }

    if let Err(e) = store.put(key, bytes.clone(), ttl).await {
        warn!(slot = %slot, key, "Failed to cache generated clip: {}", e);
    }

    info!(
        slot = %slot,
        key,
        bytes = bytes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Generated and cached clip"
    );
    Ok(bytes)
}

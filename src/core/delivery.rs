//! Clip delivery
//!
//! Picks a slot for a listener and resolves it through the orchestrator.
//! Selection is uniform over the catalog excluding the listener's previous
//! slot, so the same clip never reaches a listener twice in a row while the
//! catalog has more than one slot.

use std::sync::Arc;

use bytes::Bytes;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::core::catalog::SlotIndex;
use crate::core::orchestrator::{AcquireError, ClipOrchestrator};

/// Response header naming the slot that was served
pub const CLIP_INDEX_HEADER: &str = "x-clip-index";
/// Request header naming the slot the listener heard last
pub const LAST_CLIP_INDEX_HEADER: &str = "x-last-clip-index";

/// Result type for delivery
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Delivery failures. The endpoint reports these as a server failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The orchestrator could not produce bytes for the chosen slot
    #[error("Failed to deliver clip for slot {slot}: {source}")]
    DeliveryFailure {
        slot: SlotIndex,
        #[source]
        source: AcquireError,
    },

    /// The catalog has no slots to choose from
    #[error("Prompt catalog is empty")]
    EmptyCatalog,
}

/// A delivered clip and the slot that produced it
#[derive(Debug, Clone)]
pub struct DeliveredClip {
    pub index: SlotIndex,
    pub bytes: Bytes,
}

/// Uniform slot selection with anti-repeat
#[derive(Debug, Clone, Copy)]
pub struct SlotPicker {
    slot_count: usize,
}

impl SlotPicker {
    pub fn new(slot_count: usize) -> Self {
        Self { slot_count }
    }

    /// Pick a slot in `[0, N)`, never equal to `exclude` when `N > 1`.
    ///
    /// Draws from the `N - 1` remaining slots and shifts past the excluded
    /// one, so a single draw is always enough. An out-of-range `exclude` is
    /// ignored. Returns `None` for an empty catalog.
    pub fn pick<R: Rng + ?Sized>(&self, exclude: Option<SlotIndex>, rng: &mut R) -> Option<SlotIndex> {
        if self.slot_count == 0 {
            return None;
        }
        let exclude = exclude
            .map(SlotIndex::get)
            .filter(|&e| e < self.slot_count && self.slot_count > 1);

        let index = match exclude {
            Some(excluded) => {
                let draw = rng.gen_range(0..self.slot_count - 1);
                if draw >= excluded { draw + 1 } else { draw }
            }
            None => rng.gen_range(0..self.slot_count),
        };
        Some(SlotIndex::new(index))
    }
}

/// Delivery endpoint core: `deliver(exclude) -> {index, bytes}`
pub struct ClipDelivery {
    orchestrator: Arc<ClipOrchestrator>,
    picker: SlotPicker,
}

impl ClipDelivery {
    pub fn new(orchestrator: Arc<ClipOrchestrator>) -> Self {
        let picker = SlotPicker::new(orchestrator.catalog().len());
        Self {
            orchestrator,
            picker,
        }
    }

    pub fn orchestrator(&self) -> &Arc<ClipOrchestrator> {
        &self.orchestrator
    }

    /// Choose a slot different from `exclude` and return its clip.
    pub async fn deliver(&self, exclude: Option<SlotIndex>) -> DeliveryResult<DeliveredClip> {
        let index = self
            .picker
            .pick(exclude, &mut rand::thread_rng())
            .ok_or(DeliveryError::EmptyCatalog)?;
        debug!(slot = %index, exclude = ?exclude, "Delivering clip");

        let bytes = self
            .orchestrator
            .acquire(index)
            .await
            .map_err(|source| DeliveryError::DeliveryFailure {
                slot: index,
                source,
            })?;

        Ok(DeliveredClip { index, bytes })
    }
}

use axum::extract::{Query, State};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::core::{AcquireError, SlotIndex};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateQuery {
    /// Slot to warm; a random slot when absent
    pub index: Option<usize>,
}

/// Warm one slot through the same cache-or-generate path listeners use
pub async fn generate_clip(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GenerateQuery>,
) -> AppResult<String> {
    let slot_count = state.orchestrator.catalog().len();
    if slot_count == 0 {
        return Err(AppError::Internal("Prompt catalog is empty".to_string()));
    }

    let slot = match query.index {
        Some(index) if index >= slot_count => {
            return Err(AcquireError::UnknownSlot(SlotIndex::new(index)).into());
        }
        Some(index) => SlotIndex::new(index),
        None => SlotIndex::new(rand::thread_rng().gen_range(0..slot_count)),
    };

    let bytes = state.orchestrator.acquire(slot).await?;
    info!(slot = %slot, bytes = bytes.len(), "Slot warmed");

    Ok(format!("Lofi clip generated and cached for slot {slot}"))
}

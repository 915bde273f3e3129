use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::core::SlotIndex;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SlotInfo {
    pub index: SlotIndex,
    pub prompt: String,
    pub cache_key: String,
    /// Whether a valid clip is stored right now
    pub cached: bool,
}

/// List the prompt catalog with per-slot cache status
pub async fn list_slots(State(state): State<Arc<AppState>>) -> Json<Vec<SlotInfo>> {
    let orchestrator = &state.orchestrator;
    let mut slots = Vec::with_capacity(orchestrator.catalog().len());

    for entry in orchestrator.catalog().iter() {
        slots.push(SlotInfo {
            index: entry.index,
            prompt: entry.prompt.clone(),
            cache_key: entry.cache_key.clone(),
            cached: orchestrator.is_cached(entry.index).await,
        });
    }

    Json(slots)
}

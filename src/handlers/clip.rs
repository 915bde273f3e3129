use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::{CLIP_INDEX_HEADER, LAST_CLIP_INDEX_HEADER, SlotIndex};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

const CONTENT_TYPE: &str = "audio/wav";
const CONTENT_DISPOSITION: &str = "attachment; filename=\"lofi_clip.wav\"";

#[derive(Debug, Default, Deserialize)]
pub struct DeliverQuery {
    /// Slot the listener heard last
    pub exclude: Option<usize>,
}

/// The query parameter wins over the header. An unparseable header is ignored.
fn resolve_exclude(query: &DeliverQuery, headers: &HeaderMap) -> Option<SlotIndex> {
    if let Some(index) = query.exclude {
        return Some(SlotIndex::new(index));
    }
    let raw = headers.get(LAST_CLIP_INDEX_HEADER)?;
    match raw.to_str().ok().and_then(|s| s.trim().parse::<usize>().ok()) {
        Some(index) => Some(SlotIndex::new(index)),
        None => {
            warn!(header = ?raw, "Ignoring malformed {} header", LAST_CLIP_INDEX_HEADER);
            None
        }
    }
}

/// Deliver one clip, never repeating the listener's previous slot
///
/// `200 audio/wav` with the served slot in `X-Clip-Index`; `500 text/plain` when
/// no clip could be produced.
pub async fn deliver_clip(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeliverQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let exclude = resolve_exclude(&query, &headers);
    let clip = state.delivery.deliver(exclude).await?;

    info!(
        slot = %clip.index,
        bytes = clip.bytes.len(),
        "Clip delivered"
    );

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static(CONTENT_DISPOSITION),
    );
    let index_value = HeaderValue::from_str(&clip.index.to_string())
        .map_err(|e| AppError::Internal(format!("Invalid clip index header: {e}")))?;
    response_headers.insert(CLIP_INDEX_HEADER, index_value);

    Ok((StatusCode::OK, response_headers, clip.bytes).into_response())
}

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, clip, generate, slots};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/lofi", get(clip::deliver_clip))
        .route("/generate-lofi", get(generate::generate_clip))
        .route("/slots", get(slots::list_slots))
        .layer(TraceLayer::new_for_http())
}

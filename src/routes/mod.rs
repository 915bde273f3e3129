pub mod api;

use axum::Router;
use std::sync::Arc;

use crate::middleware::{cors_layer, with_security_headers};
use crate::state::AppState;

/// Full application router with CORS and security headers, without rate limiting
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.cors_allowed_origins.as_deref());
    let router = api::create_api_router().with_state(state).layer(cors);
    with_security_headers(router)
}

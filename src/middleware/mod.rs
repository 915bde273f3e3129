//! HTTP layers shared by every route: CORS and security headers.
//!
//! Rate limiting is attached in `main` because its key extractor needs the
//! peer address of a live connection.

use axum::Router;
use http::{HeaderName, HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::core::{CLIP_INDEX_HEADER, LAST_CLIP_INDEX_HEADER};

/// Build the CORS layer from a comma-separated origin list or `"*"`
///
/// `X-Clip-Index` is always exposed so browser listeners can track the last
/// slot they heard.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(LAST_CLIP_INDEX_HEADER)])
        .expose_headers([HeaderName::from_static(CLIP_INDEX_HEADER)]);

    match origins {
        Some("*") => base.allow_origin(Any).allow_credentials(false),
        Some(origins) => {
            // Parse comma-separated origins
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            base.allow_origin(origins).allow_credentials(true)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            // No allow_origin = same-origin only
            base.allow_credentials(false)
        }
    }
}

/// Add `nosniff` and `DENY` framing headers to every response
pub fn with_security_headers(router: Router) -> Router {
    router
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

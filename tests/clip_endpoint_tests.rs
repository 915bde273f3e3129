//! Clip Endpoint Tests
//!
//! Drives the full router (CORS, security headers, handlers) with `oneshot`
//! requests against fake generators.

mod common;

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use tower::util::ServiceExt;

use common::{UnavailableGenerator, WavGenerator, app_state, silent_wav, test_config};
use lofi_radio::{CLIP_INDEX_HEADER, DEFAULT_PROMPTS, LAST_CLIP_INDEX_HEADER, routes};

const TWO_PROMPTS: [&str; 2] = ["rainy night piano", "sunny afternoon guitar"];

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn clip_index(response: &axum::response::Response) -> usize {
    response
        .headers()
        .get(CLIP_INDEX_HEADER)
        .expect("x-clip-index header")
        .to_str()
        .unwrap()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = routes::create_app(app_state(test_config(&TWO_PROMPTS), WavGenerator::new(10)));
    let response = get(app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!({ "status": "OK" }));
}

#[tokio::test]
async fn test_delivers_wav_with_slot_header() {
    let generator = WavGenerator::new(50);
    let app = routes::create_app(app_state(test_config(&DEFAULT_PROMPTS), generator.clone()));

    let response = get(app, "/lofi").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"lofi_clip.wav\""
    );
    assert!(clip_index(&response) < DEFAULT_PROMPTS.len());
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, silent_wav(50));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn test_exclude_query_is_never_served() {
    let state = app_state(test_config(&TWO_PROMPTS), WavGenerator::new(10));

    for round in 0..20 {
        let excluded = round % 2;
        let app = routes::create_app(Arc::clone(&state));
        let response = get(app, &format!("/lofi?exclude={excluded}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(clip_index(&response), 1 - excluded);
    }
}

#[tokio::test]
async fn test_last_clip_header_is_honored() {
    let state = app_state(test_config(&TWO_PROMPTS), WavGenerator::new(10));

    for _ in 0..10 {
        let app = routes::create_app(Arc::clone(&state));
        let request = Request::builder()
            .uri("/lofi")
            .header(LAST_CLIP_INDEX_HEADER, "0")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(clip_index(&response), 1);
    }
}

#[tokio::test]
async fn test_listener_chain_never_repeats() {
    let state = app_state(test_config(&DEFAULT_PROMPTS), WavGenerator::new(10));
    let mut last: Option<usize> = None;

    for _ in 0..30 {
        let app = routes::create_app(Arc::clone(&state));
        let uri = match last {
            Some(slot) => format!("/lofi?exclude={slot}"),
            None => "/lofi".to_string(),
        };
        let served = clip_index(&get(app, &uri).await);
        assert_ne!(Some(served), last);
        last = Some(served);
    }
}

#[tokio::test]
async fn test_single_slot_catalog_repeats_its_only_clip() {
    let state = app_state(test_config(&["only one"]), WavGenerator::new(10));
    let app = routes::create_app(state);

    let response = get(app, "/lofi?exclude=0").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(clip_index(&response), 0);
}

#[tokio::test]
async fn test_generation_failure_is_plain_text_500() {
    let app = routes::create_app(app_state(
        test_config(&TWO_PROMPTS),
        Arc::new(UnavailableGenerator),
    ));

    let response = get(app, "/lofi").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert!(response.headers().get(CLIP_INDEX_HEADER).is_none());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("503"), "diagnostic should carry the cause: {text}");
}

#[tokio::test]
async fn test_generate_endpoint_warms_requested_slot() {
    let generator = WavGenerator::new(10);
    let state = app_state(test_config(&TWO_PROMPTS), generator.clone());

    let response = get(routes::create_app(Arc::clone(&state)), "/generate-lofi?index=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"Lofi clip generated and cached for slot 1");

    // Second warm is a cache hit
    get(routes::create_app(Arc::clone(&state)), "/generate-lofi?index=1").await;
    assert_eq!(generator.calls(), 1);

    let response = get(routes::create_app(state), "/slots").await;
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let slots: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(slots[0]["cached"], false);
    assert_eq!(slots[1]["cached"], true);
    assert_eq!(slots[1]["prompt"], TWO_PROMPTS[1]);
    assert_eq!(slots[1]["index"], 1);
}

#[tokio::test]
async fn test_generate_unknown_slot_is_bad_request() {
    let generator = WavGenerator::new(10);
    let app = routes::create_app(app_state(test_config(&TWO_PROMPTS), generator.clone()));

    let response = get(app, "/generate-lofi?index=7").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_slots_lists_catalog_with_distinct_keys() {
    let app = routes::create_app(app_state(test_config(&DEFAULT_PROMPTS), WavGenerator::new(10)));
    let response = get(app, "/slots").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let slots: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(slots.len(), DEFAULT_PROMPTS.len());

    let mut keys: Vec<&str> = slots.iter().map(|s| s["cache_key"].as_str().unwrap()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), DEFAULT_PROMPTS.len());
}

#[tokio::test]
async fn test_cors_exposes_clip_index() {
    let mut config = test_config(&TWO_PROMPTS);
    config.cors_allowed_origins = Some("*".to_string());
    let app = routes::create_app(app_state(config, WavGenerator::new(10)));

    let request = Request::builder()
        .uri("/lofi")
        .header(header::ORIGIN, "http://listener.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains(CLIP_INDEX_HEADER));
}

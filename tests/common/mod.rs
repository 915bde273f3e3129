//! Shared fixtures for the integration tests
//!
//! - Server configuration without any environment dependency
//! - Fake generators that return real (silent) WAV clips
//! - A helper that serves the app on a random local port

// Not every test binary uses every fixture
#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::TcpListener;

use lofi_radio::{
    AppState, ClipGenerator, GeneratorError, GeneratorResult, MemoryClipStore, ServerConfig,
    routes,
};

/// Configuration for `prompts.len()` slots, backed by nothing external
pub fn test_config(prompts: &[&str]) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        generator_url: "http://127.0.0.1:9/unused".to_string(),
        huggingface_api_key: None,
        generator_timeout_seconds: 5,
        generator_wait_for_model: false,
        cache_path: None,
        cache_ttl_seconds: 3600,
        cache_max_entries: 16,
        clip_prompts: prompts.iter().map(|p| p.to_string()).collect(),
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 100_000,
        rate_limit_burst_size: 100,
    }
}

/// 16-bit mono silence, `millis` long at 8 kHz
pub fn silent_wav(millis: u32) -> Bytes {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..(8 * millis) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    Bytes::from(cursor.into_inner())
}

/// Generates a short silent WAV for every prompt and counts the calls
pub struct WavGenerator {
    pub clip_millis: u32,
    calls: AtomicUsize,
}

impl WavGenerator {
    pub fn new(clip_millis: u32) -> Arc<Self> {
        Arc::new(Self {
            clip_millis,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClipGenerator for WavGenerator {
    async fn generate(&self, _prompt: &str) -> GeneratorResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(silent_wav(self.clip_millis))
    }
}

/// Always fails the way an overloaded inference endpoint does
pub struct UnavailableGenerator;

#[async_trait]
impl ClipGenerator for UnavailableGenerator {
    async fn generate(&self, _prompt: &str) -> GeneratorResult<Bytes> {
        Err(GeneratorError::Upstream {
            status: 503,
            message: "Model facebook/musicgen-small is currently loading".to_string(),
        })
    }
}

pub fn app_state(config: ServerConfig, generator: Arc<dyn ClipGenerator>) -> Arc<AppState> {
    AppState::with_components(config, Arc::new(MemoryClipStore::new(16)), generator)
}

/// Serve the full app on an ephemeral port; the server lives for the test runtime.
pub async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::create_app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    // Give the accept loop a moment to start
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

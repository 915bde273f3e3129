//! Hugging Face inference API generator.
//!
//! # API Reference
//!
//! - Endpoint: `POST https://api-inference.huggingface.co/models/facebook/musicgen-small`
//! - Body: `{"inputs": "<prompt>", "options": {"wait_for_model": true}}`
//! - Auth: `Authorization: Bearer <token>`
//! - Output: raw audio bytes (`audio/wav` or `audio/flac`)

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tracing::{debug, info};
use zeroize::Zeroize;

use super::{ClipGenerator, GeneratorError, GeneratorResult};

/// MusicGen small inference endpoint
pub const MUSICGEN_SMALL_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/musicgen-small";

/// Upper bound on how much of an error body is carried into the error message
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Configuration for [`HuggingFaceGenerator`]
#[derive(Clone)]
pub struct HuggingFaceGeneratorConfig {
    /// Inference endpoint URL
    pub endpoint: String,
    /// API token (optional for self-hosted endpoints)
    pub api_key: Option<String>,
    /// Whole-request timeout; generation is slow, so this is generous
    pub timeout: Duration,
    /// Ask the API to block until a cold model is loaded instead of returning 503
    pub wait_for_model: bool,
}

impl Default for HuggingFaceGeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: MUSICGEN_SMALL_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
            wait_for_model: true,
        }
    }
}

impl std::fmt::Debug for HuggingFaceGeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceGeneratorConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("wait_for_model", &self.wait_for_model)
            .finish()
    }
}

impl Drop for HuggingFaceGeneratorConfig {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.api_key {
            key.zeroize();
        }
    }
}

/// Clip generator backed by the Hugging Face inference API
pub struct HuggingFaceGenerator {
    client: reqwest::Client,
    config: HuggingFaceGeneratorConfig,
}

impl HuggingFaceGenerator {
    pub fn new(config: HuggingFaceGeneratorConfig) -> GeneratorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeneratorError::InvalidConfiguration(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Build the inference request for a prompt
    fn build_http_request(&self, prompt: &str) -> reqwest::RequestBuilder {
        let mut body = json!({ "inputs": prompt });
        if self.config.wait_for_model {
            body["options"] = json!({ "wait_for_model": true });
        }

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        request
    }
}

#[async_trait]
impl ClipGenerator for HuggingFaceGenerator {
    async fn generate(&self, prompt: &str) -> GeneratorResult<Bytes> {
        debug!(endpoint = %self.config.endpoint, "Requesting clip generation");

        let response = self.build_http_request(prompt).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(GeneratorError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let audio = response.bytes().await?;
        info!(bytes = audio.len(), "Clip generation finished");
        Ok(audio)
    }
}

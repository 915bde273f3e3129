//! Clip generator
//!
//! Opaque producer of clip bytes from a text prompt. The only shipped backend
//! is the Hugging Face inference API running MusicGen.

mod huggingface;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use huggingface::{HuggingFaceGenerator, HuggingFaceGeneratorConfig, MUSICGEN_SMALL_URL};

/// Result type for generation calls
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Errors raised by a generation call. Every variant is fatal for that call.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Service answered with a non-success status
    #[error("Generation service returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Transport-level failure (connect, timeout, body read)
    #[error("Generation request failed: {0}")]
    Request(String),

    /// Generator could not be constructed
    #[error("Invalid generator configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<reqwest::Error> for GeneratorError {
    fn from(err: reqwest::Error) -> Self {
        GeneratorError::Request(err.to_string())
    }
}

/// `generate(prompt) -> bytes | Error`
#[async_trait]
pub trait ClipGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> GeneratorResult<Bytes>;
}

/// Shared generator handle
pub type SharedClipGenerator = Arc<dyn ClipGenerator>;

use std::time::Duration;

use super::DEFAULT_PORT;
use super::env::{env_var, parse_env};
use crate::player::EngineConfig;

/// Crossfade window between consecutive clips
pub const DEFAULT_CROSSFADE_MS: u64 = 1000;
/// Duplicate deliveries tolerated per fetch before giving up
pub const DEFAULT_MAX_DUPLICATE_RETRIES: u32 = 3;
/// Consecutive undecodable clips tolerated before giving up
pub const DEFAULT_MAX_DECODE_FAILURES: u32 = 3;
/// A cold slot may need a full generation round trip
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 180;

/// Settings for the `listen` client session
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Full URL of the clip delivery endpoint
    pub stream_url: String,
    pub crossfade: Duration,
    pub max_duplicate_retries: u32,
    pub max_decode_failures: u32,
    pub request_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            stream_url: format!("http://127.0.0.1:{DEFAULT_PORT}/lofi"),
            crossfade: Duration::from_millis(DEFAULT_CROSSFADE_MS),
            max_duplicate_retries: DEFAULT_MAX_DUPLICATE_RETRIES,
            max_decode_failures: DEFAULT_MAX_DECODE_FAILURES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }
}

impl PlayerConfig {
    /// Load from `LOFI_STREAM_URL`, `PLAYER_CROSSFADE_MS`, `PLAYER_MAX_DUPLICATE_RETRIES`,
    /// `PLAYER_MAX_DECODE_FAILURES` and `PLAYER_REQUEST_TIMEOUT_SECONDS`.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = Self::default();
        let config = Self {
            stream_url: env_var("LOFI_STREAM_URL").unwrap_or(defaults.stream_url),
            crossfade: Duration::from_millis(parse_env(
                "PLAYER_CROSSFADE_MS",
                DEFAULT_CROSSFADE_MS,
            )?),
            max_duplicate_retries: parse_env(
                "PLAYER_MAX_DUPLICATE_RETRIES",
                DEFAULT_MAX_DUPLICATE_RETRIES,
            )?,
            max_decode_failures: parse_env(
                "PLAYER_MAX_DECODE_FAILURES",
                DEFAULT_MAX_DECODE_FAILURES,
            )?,
            request_timeout: Duration::from_secs(parse_env(
                "PLAYER_REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )?),
        };

        url::Url::parse(&config.stream_url)
            .map_err(|e| format!("Invalid stream URL '{}': {e}", config.stream_url))?;
        if config.max_duplicate_retries == 0 {
            return Err("PLAYER_MAX_DUPLICATE_RETRIES must be at least 1".into());
        }

        Ok(config)
    }

    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = url.into();
        self
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            crossfade: self.crossfade,
            max_duplicate_retries: self.max_duplicate_retries,
            max_decode_failures: self.max_decode_failures,
        }
    }
}

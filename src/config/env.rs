//! Environment variable loading
//!
//! Produces a complete [`ServerConfig`] from the process environment, falling back
//! to defaults for anything unset. YAML overrides are applied afterwards by `merge`.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_GENERATOR_TIMEOUT_SECONDS,
    DEFAULT_PORT, ServerConfig, TlsConfig, parse_prompts_json,
};
use crate::core::{DEFAULT_PROMPTS, MUSICGEN_SMALL_URL};

/// Read a variable, treating empty values as unset
pub(super) fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable into `T`, returning `default` when unset
pub(super) fn parse_env<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| format!("Invalid value for {key} ('{raw}'): {e}").into()),
        None => Ok(default),
    }
}

/// Parse a boolean flag. Accepts true/false, 1/0, yes/no, on/off.
pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_env_bool(key: &str, default: bool) -> Result<bool, Box<dyn std::error::Error>> {
    match env_var(key) {
        Some(raw) => {
            parse_bool(&raw).ok_or_else(|| format!("Invalid boolean for {key}: '{raw}'").into())
        }
        None => Ok(default),
    }
}

/// Build the TLS config from `TLS_CERT_PATH` / `TLS_KEY_PATH`.
///
/// Both must be set together.
fn tls_from_env() -> Result<Option<TlsConfig>, Box<dyn std::error::Error>> {
    match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        _ => Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
    }
}

impl ServerConfig {
    /// Load configuration from the environment without validating it
    pub(super) fn from_env_unvalidated() -> Result<Self, Box<dyn std::error::Error>> {
        let clip_prompts = match env_var("CLIP_PROMPTS_JSON") {
            Some(json) => parse_prompts_json(&json)?,
            None => DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect(),
        };

        Ok(ServerConfig {
            host: env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_env("PORT", DEFAULT_PORT)?,
            tls: tls_from_env()?,
            generator_url: env_var("GENERATOR_URL")
                .unwrap_or_else(|| MUSICGEN_SMALL_URL.to_string()),
            huggingface_api_key: env_var("HUGGINGFACE_API_KEY"),
            generator_timeout_seconds: parse_env(
                "GENERATOR_TIMEOUT_SECONDS",
                DEFAULT_GENERATOR_TIMEOUT_SECONDS,
            )?,
            generator_wait_for_model: parse_env_bool("GENERATOR_WAIT_FOR_MODEL", true)?,
            cache_path: env_var("CACHE_PATH").map(PathBuf::from),
            cache_ttl_seconds: parse_env("CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS)?,
            cache_max_entries: parse_env("CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES)?,
            clip_prompts,
            cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: parse_env("RATE_LIMIT_REQUESTS_PER_SECOND", 60)?,
            rate_limit_burst_size: parse_env("RATE_LIMIT_BURST_SIZE", 10)?,
        })
    }
}

//! Configuration module for the lofi radio server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//! The configuration is split into logical submodules for maintainability.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `player`: Settings for the `listen` client
//!
//! # Example
//! ```rust,no_run
//! use lofi_radio::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod env;
mod merge;
mod player;
mod validation;
mod yaml;

pub use player::PlayerConfig;

use crate::core::{HuggingFaceGeneratorConfig, PromptCatalog};

/// Default listening port
pub const DEFAULT_PORT: u16 = 3001;
/// Default clip time-to-live (one day)
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 86_400;
/// Default capacity of the in-memory clip store
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 64;
/// Default whole-request timeout for a generation call
pub const DEFAULT_GENERATOR_TIMEOUT_SECONDS: u64 = 120;

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the lofi radio server, including:
/// - Server settings (host, port, TLS)
/// - Generator endpoint and credentials
/// - Clip cache settings
/// - Prompt catalog
/// - Security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Generator settings
    /// Inference endpoint that turns a prompt into clip bytes
    pub generator_url: String,
    /// Hugging Face API token
    pub huggingface_api_key: Option<String>,
    pub generator_timeout_seconds: u64,
    /// Block on cold model loads instead of failing with 503
    pub generator_wait_for_model: bool,

    // Cache configuration (filesystem or memory)
    pub cache_path: Option<PathBuf>, // if None, use in-memory cache
    pub cache_ttl_seconds: u64,
    /// Capacity of the in-memory store; ignored by the filesystem store
    pub cache_max_entries: u64,

    /// Slot index → prompt, in slot order
    pub clip_prompts: Vec<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Zeroize the generator token when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.huggingface_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// Reads every setting from the environment (after `.env` has been applied in
    /// `main`), fills in defaults, then validates the result.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // Note: .env file is loaded in main.rs at application startup
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Settings for the Hugging Face generator
    pub fn generator_config(&self) -> HuggingFaceGeneratorConfig {
        HuggingFaceGeneratorConfig {
            endpoint: self.generator_url.clone(),
            api_key: self.huggingface_api_key.clone(),
            timeout: Duration::from_secs(self.generator_timeout_seconds),
            wait_for_model: self.generator_wait_for_model,
        }
    }

    /// Build the immutable prompt catalog shared by every request
    pub fn prompt_catalog(&self) -> Arc<PromptCatalog> {
        Arc::new(PromptCatalog::from_prompts(self.clip_prompts.iter()))
    }
}

pub(crate) fn parse_prompts_json(json_str: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let prompts: Vec<String> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid CLIP_PROMPTS_JSON format: {e}"))?;
    Ok(prompts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DEFAULT_PROMPTS;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    /// Helper function to create a test ServerConfig with defaults
    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "localhost".to_string(),
            port: 3001,
            tls: None,
            generator_url: "http://localhost:9000/models/musicgen".to_string(),
            huggingface_api_key: None,
            generator_timeout_seconds: 30,
            generator_wait_for_model: true,
            cache_path: None,
            cache_ttl_seconds: 300,
            cache_max_entries: 16,
            clip_prompts: vec!["a".to_string(), "b".to_string()],
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
        }
    }

    fn clear_env() {
        for key in [
            "HOST",
            "PORT",
            "TLS_CERT_PATH",
            "TLS_KEY_PATH",
            "GENERATOR_URL",
            "HUGGINGFACE_API_KEY",
            "GENERATOR_TIMEOUT_SECONDS",
            "GENERATOR_WAIT_FOR_MODEL",
            "CACHE_PATH",
            "CACHE_TTL_SECONDS",
            "CACHE_MAX_ENTRIES",
            "CLIP_PROMPTS_JSON",
            "CORS_ALLOWED_ORIGINS",
            "RATE_LIMIT_REQUESTS_PER_SECOND",
            "RATE_LIMIT_BURST_SIZE",
        ] {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_address_and_tls() {
        let mut config = test_config();
        assert_eq!(config.address(), "localhost:3001");
        assert!(!config.is_tls_enabled());

        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from("/tmp/cert.pem"),
            key_path: PathBuf::from("/tmp/key.pem"),
        });
        assert!(config.is_tls_enabled());
    }

    #[test]
    fn test_generator_config_mapping() {
        let mut config = test_config();
        config.huggingface_api_key = Some("hf_abc".to_string());

        let generator = config.generator_config();
        assert_eq!(generator.endpoint, "http://localhost:9000/models/musicgen");
        assert_eq!(generator.api_key.as_deref(), Some("hf_abc"));
        assert_eq!(generator.timeout, Duration::from_secs(30));
        assert!(generator.wait_for_model);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_prompt_catalog_follows_prompts() {
        let config = test_config();
        let catalog = config.prompt_catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.prompt(0.into()), Some("a"));
    }

    #[test]
    fn test_parse_prompts_json() {
        let prompts = parse_prompts_json(r#"["rain", "vinyl crackle"]"#).unwrap();
        assert_eq!(prompts, vec!["rain", "vinyl crackle"]);
        assert!(parse_prompts_json("not json").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.cache_ttl_seconds, DEFAULT_CACHE_TTL_SECONDS);
        assert_eq!(config.cache_max_entries, DEFAULT_CACHE_MAX_ENTRIES);
        assert_eq!(config.generator_url, crate::core::MUSICGEN_SMALL_URL);
        assert_eq!(config.clip_prompts.len(), DEFAULT_PROMPTS.len());
        assert!(config.cache_path.is_none());
        assert!(config.tls.is_none());
        assert_eq!(config.rate_limit_requests_per_second, 60);
        assert_eq!(config.rate_limit_burst_size, 10);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        unsafe {
            env::set_var("PORT", "8080");
            env::set_var("HUGGINGFACE_API_KEY", "hf_env");
            env::set_var("CACHE_TTL_SECONDS", "300");
            env::set_var("CACHE_PATH", "/tmp/lofi-cache");
            env::set_var("CLIP_PROMPTS_JSON", r#"["one","two","three"]"#);
            env::set_var("GENERATOR_WAIT_FOR_MODEL", "false");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.huggingface_api_key.as_deref(), Some("hf_env"));
        assert_eq!(config.cache_ttl_seconds, 300);
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/lofi-cache")));
        assert_eq!(config.clip_prompts, vec!["one", "two", "three"]);
        assert!(!config.generator_wait_for_model);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_ttl() {
        clear_env();
        unsafe {
            env::set_var("CACHE_TTL_SECONDS", "0");
        }

        assert!(ServerConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        clear_env();
        unsafe {
            env::set_var("PORT", "9000");
            env::set_var("HUGGINGFACE_API_KEY", "hf_env");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
server:
  port: 4000
cache:
  ttl_seconds: 600
catalog:
  prompts:
    - "late night jazz hop"
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.cache_ttl_seconds, 600);
        assert_eq!(config.clip_prompts, vec!["late night jazz hop"]);
        // Not in YAML, falls through to env
        assert_eq!(config.huggingface_api_key.as_deref(), Some("hf_env"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        clear_env();
        let result = ServerConfig::from_file(&PathBuf::from("/nonexistent/lofi.yaml"));
        assert!(result.is_err());
    }
}

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Merge YAML overrides on top of the environment-derived configuration
///
/// Any value present in YAML wins; anything absent falls through to the
/// environment (which itself falls back to defaults).
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::from_env_unvalidated()?;

    let Some(yaml) = yaml_config else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            config.tls = merge_tls(config.tls.take(), tls)?;
        }
    }

    if let Some(generator) = yaml.generator {
        if let Some(url) = generator.url {
            config.generator_url = url;
        }
        if let Some(api_key) = generator.api_key {
            config.huggingface_api_key = Some(api_key);
        }
        if let Some(timeout) = generator.timeout_seconds {
            config.generator_timeout_seconds = timeout;
        }
        if let Some(wait) = generator.wait_for_model {
            config.generator_wait_for_model = wait;
        }
    }

    if let Some(cache) = yaml.cache {
        if let Some(path) = cache.path {
            config.cache_path = Some(PathBuf::from(path));
        }
        if let Some(ttl) = cache.ttl_seconds {
            config.cache_ttl_seconds = ttl;
        }
        if let Some(max_entries) = cache.max_entries {
            config.cache_max_entries = max_entries;
        }
    }

    if let Some(prompts) = yaml.catalog.and_then(|c| c.prompts) {
        config.clip_prompts = prompts;
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
    }

    Ok(config)
}

/// `enabled: false` switches TLS off even when the environment configured it.
/// Paths given in YAML replace the environment's.
fn merge_tls(
    base: Option<TlsConfig>,
    yaml: super::yaml::TlsYaml,
) -> Result<Option<TlsConfig>, Box<dyn std::error::Error>> {
    if yaml.enabled == Some(false) {
        return Ok(None);
    }

    let cert_path = yaml
        .cert_path
        .map(PathBuf::from)
        .or_else(|| base.as_ref().map(|t| t.cert_path.clone()));
    let key_path = yaml
        .key_path
        .map(PathBuf::from)
        .or_else(|| base.as_ref().map(|t| t.key_path.clone()));

    match (cert_path, key_path) {
        (Some(cert_path), Some(key_path)) => Ok(Some(TlsConfig {
            cert_path,
            key_path,
        })),
        (None, None) if yaml.enabled != Some(true) => Ok(None),
        _ => Err("TLS requires both server.tls.cert_path and server.tls.key_path".into()),
    }
}

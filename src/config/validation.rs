use url::Url;

use super::ServerConfig;

/// Run every check against a fully merged configuration
pub fn validate_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_prompts(&config.clip_prompts)?;
    validate_cache_ttl(config.cache_ttl_seconds)?;
    validate_generator_url(&config.generator_url)?;
    if config.cache_max_entries == 0 {
        return Err("cache max_entries must be greater than zero".into());
    }
    if config.generator_timeout_seconds == 0 {
        return Err("generator timeout_seconds must be greater than zero".into());
    }
    Ok(())
}

/// The catalog must have at least one slot and no blank prompts
pub fn validate_prompts(prompts: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if prompts.is_empty() {
        return Err("Prompt catalog must contain at least one prompt".into());
    }
    if let Some(index) = prompts.iter().position(|p| p.trim().is_empty()) {
        return Err(format!("Prompt for slot {index} is blank").into());
    }
    Ok(())
}

pub fn validate_cache_ttl(ttl_seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    if ttl_seconds == 0 {
        return Err("cache ttl_seconds must be greater than zero".into());
    }
    Ok(())
}

pub fn validate_generator_url(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid generator URL '{url}': {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!("Generator URL must be http or https, got '{scheme}'").into()),
    }
}

use crate::config::types::{
    ApiConfig, CacheConfig, Config, OutputConfig, ProfessionEntry, RateLimitConfig, RetryConfig,
    ScraperConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Largest page the upstream API serves
const MAX_PAGE_SIZE: u32 = 100;

/// Upper bound on professions processed in parallel
const MAX_CONCURRENCY: u32 = 16;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_retry_config(&config.retry)?;
    validate_scraper_config(&config.scraper)?;
    validate_output_config(&config.output)?;
    validate_cache_config(&config.cache)?;
    validate_professions(&config.professions)?;
    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;
    validate_http_url("token-url", &config.token_url)?;

    for (name, value) in [
        ("client-id", &config.client_id),
        ("client-secret", &config.client_secret),
        ("user-agent", &config.user_agent),
        ("area", &config.area),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    if config.page_size < 1 || config.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, config.page_size
        )));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "rate-limit capacity must be >= 1, got {}",
            config.capacity
        )));
    }

    if config.refill_per_second < 1 {
        return Err(ConfigError::Validation(format!(
            "refill-per-second must be >= 1, got {}",
            config.refill_per_second
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.initial_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "initial-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.initial_delay_ms, config.max_delay_ms
        )));
    }

    if !config.multiplier.is_finite() || config.multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "multiplier must be a finite value >= 1.0, got {}",
            config.multiplier
        )));
    }

    if config.max_total_time_ms == 0 {
        return Err(ConfigError::Validation(
            "max-total-time-ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.profession_timeout_secs == 0 || config.run_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "profession-timeout-secs and run-timeout-secs must be > 0".to_string(),
        ));
    }

    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.expiry_secs == 0 || config.write_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "cache expiry-secs and write-timeout-secs must be > 0".to_string(),
        ));
    }

    if config.queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "cache queue-capacity must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_professions(professions: &[ProfessionEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in professions {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "profession name cannot be empty".to_string(),
            ));
        }

        if entry.query.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "profession '{}' must have a non-empty query",
                entry.name
            )));
        }

        if !seen.insert(entry.name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate profession name '{}'",
                entry.name
            )));
        }
    }

    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, value
        )));
    }

    Ok(())
}

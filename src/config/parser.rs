use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable overriding `api.access-token`
pub const ACCESS_TOKEN_ENV: &str = "HH_ACCESS_TOKEN";

/// Environment variable overriding `api.client-secret`
pub const CLIENT_SECRET_ENV: &str = "HH_CLIENT_SECRET";

/// Loads and parses a configuration file from the given path
///
/// Secrets may be supplied through the environment instead of the file;
/// `HH_CLIENT_SECRET` and `HH_ACCESS_TOKEN` take precedence over the
/// corresponding file values.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;

    apply_env_overrides(
        &mut config,
        std::env::var(CLIENT_SECRET_ENV).ok(),
        std::env::var(ACCESS_TOKEN_ENV).ok(),
    );

    validate(&config)?;

    Ok(config)
}

/// Parses configuration TOML without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

fn apply_env_overrides(
    config: &mut Config,
    client_secret: Option<String>,
    access_token: Option<String>,
) {
    if let Some(secret) = client_secret.filter(|s| !s.is_empty()) {
        config.api.client_secret = secret;
    }

    if let Some(token) = access_token.filter(|t| !t.is_empty()) {
        config.api.access_token = Some(token);
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is stamped on every persisted scraping session so that
/// statistics can be traced back to the configuration that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::config::validation::{check_cache_url, validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    /// A required secret is absent from the environment and the file.
    #[error("{what} not configured (set ${var})")]
    MissingEnv { what: &'static str, var: String },

    #[error("invalid {what}: {message}")]
    Invalid { what: &'static str, message: String },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GuardConfig, ConfigError> {
    let config: GuardConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// External secrets the service cannot start without.
#[derive(Clone)]
pub struct Secrets {
    /// Bearer key for the embedding provider.
    pub api_key: String,
    /// Cache connection URL, possibly carrying a password.
    pub cache_url: String,
}

impl Secrets {
    /// Resolve secrets from the process environment.
    pub fn from_env(config: &GuardConfig) -> Result<Self, ConfigError> {
        Self::resolve(config, |var| std::env::var(var).ok())
    }

    /// Resolve secrets through `lookup`, falling back to the file's cache URL.
    pub fn resolve<F>(config: &GuardConfig, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(&config.embedding.api_key_env)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv {
                what: "embedding API key",
                var: config.embedding.api_key_env.clone(),
            })?;

        let cache_url = lookup(&config.cache.url_env)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| config.cache.url.clone())
            .ok_or_else(|| ConfigError::MissingEnv {
                what: "cache URL",
                var: config.cache.url_env.clone(),
            })?;
        check_cache_url(&cache_url).map_err(|message| ConfigError::Invalid {
            what: "cache URL",
            message,
        })?;

        Ok(Self { api_key, cache_url })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("api_key", &"<redacted>")
            .field("cache_url", &"<redacted>")
            .finish()
    }
}

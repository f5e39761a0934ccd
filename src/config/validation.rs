//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and URL shapes.
//! Every problem is reported, not just the first.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{BreakerConfig, GuardConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }

    match Url::parse(&config.embedding.api_base) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "embedding.api_base",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("embedding.api_base", e.to_string())),
    }
    if config.embedding.model.trim().is_empty() {
        errors.push(ValidationError::new("embedding.model", "must not be empty"));
    }
    if config.embedding.api_key_env.trim().is_empty() {
        errors.push(ValidationError::new("embedding.api_key_env", "must name an environment variable"));
    }
    if config.embedding.request_timeout_secs == 0 {
        errors.push(ValidationError::new("embedding.request_timeout_secs", "must be greater than 0"));
    }
    if config.embedding.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("embedding.connect_timeout_secs", "must be greater than 0"));
    }

    if let Some(url) = &config.cache.url {
        if let Err(message) = check_cache_url(url) {
            errors.push(ValidationError::new("cache.url", message));
        }
    }
    if config.cache.timeout_secs == 0 {
        errors.push(ValidationError::new("cache.timeout_secs", "must be greater than 0"));
    }

    check_breaker("breakers.embedding", &config.breakers.embedding, &mut errors);
    check_breaker("breakers.redis", &config.breakers.redis, &mut errors);

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check that a cache URL is a plain `redis://` URL with a host.
pub fn check_cache_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "redis" => {}
        "rediss" => {
            return Err("TLS (rediss://) is not supported; use a redis:// URL".to_string());
        }
        other => return Err(format!("unsupported scheme '{other}', expected redis://")),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }
    Ok(url)
}

fn check_breaker(prefix: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.failure_threshold"),
            "must be greater than 0",
        ));
    }
    if breaker.reset_timeout_secs == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.reset_timeout_secs"),
            "must be greater than 0",
        ));
    }
    if breaker.window_size == 0 {
        errors.push(ValidationError::new(format!("{prefix}.window_size"), "must be greater than 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GuardConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = GuardConfig::default();
        config.breakers.embedding.failure_threshold = 0;
        config.breakers.redis.reset_timeout_secs = 0;
        config.listener.bind_address = "not-an-address".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "breakers.embedding.failure_threshold",
                "breakers.redis.reset_timeout_secs",
            ]
        );
    }

    #[test]
    fn test_cache_url_shape() {
        assert!(check_cache_url("redis://:secret@cache.internal:6380").is_ok());
        assert!(check_cache_url("not a url").is_err());
        assert!(check_cache_url("memcached://cache.internal").unwrap_err().contains("expected redis://"));
    }

    #[test]
    fn test_tls_cache_url_names_tls() {
        let message = check_cache_url("rediss://cache.internal:6380").unwrap_err();
        assert!(message.contains("TLS"), "{message}");
    }
}

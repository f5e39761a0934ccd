//! Error types for the guard service.
//!
//! Callers of a protected dependency see three kinds of failure: the
//! breaker refusing the call (`BreakerOpen`), the dependency's own error
//! (every other runtime variant), and fatal startup misconfiguration
//! (`Configuration`).

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::resilience::circuit_breaker::BreakerError;
use crate::resilience::timeouts::Elapsed;

/// The main error type for protected calls and service startup.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected by the breaker without attempting the operation.
    #[error("circuit breaker '{name}' is open; retry after {retry_after:?}")]
    BreakerOpen { name: String, retry_after: Duration },

    /// Missing or invalid external configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The input was refused before reaching the dependency.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transport-level failure talking to an HTTP dependency.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The dependency did not answer in time.
    #[error("'{name}' timed out after {limit:?}")]
    Timeout { name: String, limit: Duration },

    /// The dependency answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The dependency answered with something we could not use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The cache backend refused or garbled the exchange.
    #[error("cache error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the breaker rejected the call.
    pub fn is_breaker_open(&self) -> bool {
        matches!(self, Self::BreakerOpen { .. })
    }

    /// Returns `true` if the dependency timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

impl From<BreakerError<Error>> for Error {
    fn from(err: BreakerError<Error>) -> Self {
        match err {
            BreakerError::Open { name, retry_after } => Self::BreakerOpen { name, retry_after },
            BreakerError::Failed(inner) => inner,
        }
    }
}

impl From<Elapsed> for Error {
    fn from(elapsed: Elapsed) -> Self {
        Self::Timeout {
            name: elapsed.name,
            limit: elapsed.limit,
        }
    }
}

/// A specialized `Result` type for guard operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_open_is_distinct_from_failures() {
        let open: Error = BreakerError::<Error>::Open {
            name: "embedding".into(),
            retry_after: Duration::from_secs(30),
        }
        .into();
        assert!(open.is_breaker_open());

        let failed: Error = BreakerError::Failed(Error::Cache("LOADING".into())).into();
        assert!(!failed.is_breaker_open());
        assert_eq!(failed.to_string(), "cache error: LOADING");
    }

    #[test]
    fn test_elapsed_maps_to_timeout() {
        let err: Error = Elapsed {
            name: "redis".into(),
            limit: Duration::from_secs(5),
        }
        .into();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("redis"));
    }
}

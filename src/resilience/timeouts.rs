//! Timeout enforcement for protected operations.
//!
//! The breaker never bounds an operation itself. Callers wrap the
//! operation they hand to the breaker with [`with_timeout`] so a hung
//! dependency surfaces as an ordinary failure, and the timeout is counted
//! against the dependency's name.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::observability::metrics;

/// The operation did not finish within its limit.
#[derive(Debug, Clone, Error)]
#[error("'{name}' timed out after {limit:?}")]
pub struct Elapsed {
    pub name: String,
    pub limit: Duration,
}

/// Run `fut` for at most `limit`, recording a timeout for `name` on expiry.
pub async fn with_timeout<F, T>(name: &str, limit: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => Ok(value),
        Err(_) => {
            metrics::record_timeout(name);
            tracing::warn!(breaker = name, limit = ?limit, "Operation timed out");
            Err(Elapsed {
                name: name.to_string(),
                limit,
            })
        }
    }
}

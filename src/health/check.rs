//! Cache health check.
//!
//! The one place where breaker state is folded into a status string.

use std::collections::BTreeMap;

use crate::context::AppContext;
use crate::health::report::{CacheStatus, HealthReport, HealthStatus};

/// Ping the cache through its breaker and summarize every breaker.
pub async fn check(ctx: &AppContext) -> HealthReport {
    let (status, redis, error) = match ctx.cache().ping().await {
        Ok(()) => (HealthStatus::Healthy, CacheStatus::Connected, None),
        Err(e) if e.is_breaker_open() => (HealthStatus::Degraded, CacheStatus::CircuitOpen, None),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (HealthStatus::Unhealthy, CacheStatus::Error, Some(e.to_string()))
        }
    };

    let breakers: BTreeMap<_, _> = ctx
        .breakers()
        .snapshots()
        .into_iter()
        .map(|s| (s.name, s.state))
        .collect();

    HealthReport {
        status,
        redis,
        error,
        breakers,
    }
}

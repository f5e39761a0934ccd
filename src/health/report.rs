//! Health report returned by `GET /healthz`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::resilience::CircuitState;

/// Coarse service status for external monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The cache answered through a closed (or recovering) breaker.
    Healthy,
    /// The breaker shed the check; the dependency is presumed down.
    Degraded,
    /// The check ran and failed outside the breaker's own model.
    Unhealthy,
}

impl HealthStatus {
    pub fn is_serving(&self) -> bool {
        !matches!(self, Self::Unhealthy)
    }
}

/// Cache connectivity as seen by the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Connected,
    CircuitOpen,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub redis: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// State of every registered breaker, by name.
    pub breakers: BTreeMap<String, CircuitState>,
}

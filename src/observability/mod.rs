//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers and HTTP handlers produce:
//!     → logging.rs (structured log events, pretty or JSON)
//!     → metrics.rs (counters and gauges labelled by breaker name)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`breaker`, `state`, `request_id`) on every event
//! - Metrics are cheap (atomic increments) and safe to emit under the breaker lock
//! - Metric names are stable; the smoke-test CLI greps for them

pub mod logging;
pub mod metrics;

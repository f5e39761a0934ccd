//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /healthz
//!     → check.rs: cache ping through the "redis" breaker
//!         Ok            → healthy   / connected
//!         BreakerOpen   → degraded  / circuit_open
//!         other failure → unhealthy / error (+ message)
//!     → report.rs: HealthReport with every breaker's state
//! ```
//!
//! # Design Decisions
//! - Health checks are on demand; there is no background prober
//! - A check counts toward the cache breaker like any other call

pub mod check;
pub mod report;

pub use check::check;
pub use report::{CacheStatus, HealthReport, HealthStatus};

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a protected dependency:
//!     → registry.rs (one breaker per dependency name)
//!     → circuit_breaker.rs (admit, reject fast, or admit the probe)
//!     → timeouts.rs (caller-side deadline around the operation)
//!     → circuit_breaker.rs (count outcome, transition state)
//!
//! Caller that chooses to retry (CLI smoke test only):
//!     → backoff.rs (jittered exponential delay)
//! ```
//!
//! # Design Decisions
//! - The breaker never retries and never imposes a timeout
//! - Breaker rejections are a distinct error from dependency failures
//! - Breakers live for the whole process; no per-call instances

pub mod backoff;
pub mod circuit_breaker;
pub mod registry;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use registry::BreakerRegistry;

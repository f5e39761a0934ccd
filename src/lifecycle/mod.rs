//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Logging → Metrics → AppContext (breakers, clients) → Listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Log breaker totals → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then context, then listener
//! - Breakers and clients are created once and dropped only at exit

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;

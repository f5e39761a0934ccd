//! Circuit-breaker guard for the VoiceROI RAG API's external dependencies.

pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod services;

pub use config::GuardConfig;
pub use context::AppContext;
pub use error::{Error, Result};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{BreakerError, CircuitBreaker, CircuitState};

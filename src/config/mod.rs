//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!
//! environment ($OPENAI_API_KEY, $REDIS_URL)
//!     → loader.rs Secrets::from_env
//!     → fatal ConfigError when absent
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers are built from it once
//! - All fields have defaults to allow minimal configs
//! - Secrets live in the environment, never in the file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError, Secrets};
pub use schema::{
    BreakerConfig, BreakersConfig, CacheConfig, EmbeddingConfig, GuardConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, TimeoutConfig,
};

//! Protected dependencies.
//!
//! # Data Flow
//! ```text
//! POST /embed
//!     → embedding.rs embed_text
//!     → "embedding" breaker → provider /embeddings (reqwest, deadlines)
//!
//! GET /healthz
//!     → cache.rs ping
//!     → "redis" breaker → timeouts::with_timeout → RESP PING
//! ```
//!
//! # Design Decisions
//! - Each client owns an `Arc` to its breaker; neither builds its own
//! - Deadlines are set by the client, never by the breaker

pub mod cache;
pub mod embedding;

pub use cache::CacheClient;
pub use embedding::EmbeddingClient;

/// Breaker name for the embedding call path.
pub const EMBEDDING: &str = "embedding";

/// Breaker name for the cache health-check path.
pub const REDIS: &str = "redis";

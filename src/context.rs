//! Process-wide application context.
//!
//! Built exactly once at startup and handed to every handler behind an
//! `Arc`. It owns the breaker registry and the clients of the protected
//! dependencies; nothing in the crate reaches for ambient globals.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::{GuardConfig, Secrets};
use crate::error::Result;
use crate::resilience::{BreakerRegistry, BreakerSnapshot};
use crate::services::{CacheClient, EmbeddingClient, EMBEDDING, REDIS};

pub struct AppContext {
    config: GuardConfig,
    breakers: BreakerRegistry,
    embedding: EmbeddingClient,
    cache: CacheClient,
    metrics: Option<PrometheusHandle>,
}

impl AppContext {
    /// Build the context, reading secrets from the environment.
    pub fn initialize(config: GuardConfig, metrics: Option<PrometheusHandle>) -> Result<Arc<Self>> {
        let secrets = Secrets::from_env(&config)?;
        Self::with_secrets(config, secrets, metrics)
    }

    /// Build the context from explicitly supplied secrets.
    pub fn with_secrets(
        config: GuardConfig,
        secrets: Secrets,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Arc<Self>> {
        let breakers = BreakerRegistry::new();
        let embedding_breaker = breakers.get_or_create(EMBEDDING, config.breakers.embedding);
        let cache_breaker = breakers.get_or_create(REDIS, config.breakers.redis);

        let embedding = EmbeddingClient::new(&config.embedding, secrets.api_key, embedding_breaker)?;
        let cache = CacheClient::new(&config.cache, &secrets.cache_url, cache_breaker)?;

        tracing::info!(
            model = %embedding.model(),
            breakers = breakers.len(),
            metrics = metrics.is_some(),
            "Application context initialized"
        );

        Ok(Arc::new(Self {
            config,
            breakers,
            embedding,
            cache,
            metrics,
        }))
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn embedding(&self) -> &EmbeddingClient {
        &self.embedding
    }

    pub fn cache(&self) -> &CacheClient {
        &self.cache
    }

    pub fn metrics(&self) -> Option<&PrometheusHandle> {
        self.metrics.as_ref()
    }

    /// Final accounting before the process exits.
    pub fn shutdown(&self) -> Vec<BreakerSnapshot> {
        let snapshots = self.breakers.snapshots();
        for s in &snapshots {
            tracing::info!(
                breaker = %s.name,
                state = %s.state,
                calls = s.calls,
                failures = s.failures,
                rejections = s.rejections,
                consecutive_opens = s.consecutive_opens,
                "Breaker final state"
            );
        }
        snapshots
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("embedding", &self.embedding)
            .field("cache", &self.cache)
            .field("breakers", &self.breakers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;

    fn secrets() -> Secrets {
        Secrets {
            api_key: "sk-test".to_string(),
            cache_url: "redis://127.0.0.1:6379".to_string(),
        }
    }

    #[test]
    fn test_registers_one_breaker_per_dependency() {
        let ctx = AppContext::with_secrets(GuardConfig::default(), secrets(), None).unwrap();

        let embedding = ctx.breakers().get(EMBEDDING).unwrap();
        assert!(Arc::ptr_eq(&embedding, ctx.embedding().breaker()));
        let redis = ctx.breakers().get(REDIS).unwrap();
        assert!(Arc::ptr_eq(&redis, ctx.cache().breaker()));
        assert_eq!(redis.failure_threshold(), 3);
    }

    #[test]
    fn test_shutdown_reports_every_breaker() {
        let ctx = AppContext::with_secrets(GuardConfig::default(), secrets(), None).unwrap();
        let snapshots = ctx.shutdown();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.iter().all(|s| s.state == CircuitState::Closed));
    }

    #[test]
    fn test_invalid_cache_url_is_configuration_error() {
        let mut bad = secrets();
        bad.cache_url = "memcached://localhost".to_string();
        let err = AppContext::with_secrets(GuardConfig::default(), bad, None).unwrap_err();
        assert!(matches!(err, crate::error::Error::Configuration(_)));
    }
}

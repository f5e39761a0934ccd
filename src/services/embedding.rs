//! Text embedding client.
//!
//! `embed_text` is the only way the service produces embeddings, so every
//! provider call passes through the `"embedding"` breaker.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::resilience::CircuitBreaker;

const PREVIEW_CHARS: usize = 40;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    breaker: Arc<CircuitBreaker>,
}

impl EmbeddingClient {
    /// Build a client with connect and request deadlines from `config`.
    pub fn new(config: &EmbeddingConfig, api_key: String, breaker: Arc<CircuitBreaker>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/embeddings", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            breaker,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Embed `text`, protected by the embedding breaker.
    ///
    /// # Errors
    /// - `Error::BreakerOpen` when the provider is being shed
    /// - the provider's own failure otherwise, already counted by the breaker
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("text must not be empty".to_string()));
        }
        let preview = preview(text);

        match self.breaker.call(|| self.request(text)).await.map_err(Error::from) {
            Ok(embedding) => {
                tracing::debug!(
                    breaker = %self.breaker.name(),
                    dimensions = embedding.len(),
                    preview = %preview,
                    "Generated embedding"
                );
                Ok(embedding)
            }
            Err(e) if e.is_breaker_open() => {
                tracing::warn!(preview = %preview, "Circuit open, cannot embed");
                Err(e)
            }
            Err(e) => {
                tracing::error!(error = %e, preview = %preview, "Failed to embed text");
                Err(e)
            }
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: text,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|e| self.transport_error(e))?;
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        // A stalled body is a timeout, not a malformed payload.
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let parsed: EmbeddingResponse =
            serde_json::from_slice(&body).map_err(|e| Error::InvalidResponse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| Error::InvalidResponse("response carried no embedding".to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            metrics::record_timeout(self.breaker.name());
        }
        Error::Http(err)
    }
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("breaker", &self.breaker.name())
            .finish()
    }
}

/// First characters of `text` for log lines, never the whole input.
fn preview(text: &str) -> String {
    truncate(text, PREVIEW_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

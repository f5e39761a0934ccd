//! Route handlers.
//!
//! # Responsibilities
//! - `POST /embed`: embed text through the embedding breaker
//! - `GET /healthz`: cache ping folded into a `HealthReport`
//! - `GET /breakers`, `GET /metrics`, `GET /version`: read-only views
//!
//! Handlers stay thin; breaker and dependency logic lives in `services`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::health::{self, HealthReport};
use crate::http::request::RequestId;
use crate::http::response::ApiError;
use crate::resilience::BreakerSnapshot;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Body of `POST /embed`.
#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embedding: Vec<f32>,
    pub dimensions: usize,
    pub model: String,
}

#[derive(Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub status: &'static str,
}

/// Embed the request text, mapping breaker rejections to 503.
pub async fn embed(
    State(ctx): State<Arc<AppContext>>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, ApiError> {
    tracing::debug!(request_id = %request_id.as_str(), chars = body.text.len(), "Embed request");
    let embedding = ctx.embedding().embed_text(&body.text).await?;

    Ok(Json(EmbedResponse {
        dimensions: embedding.len(),
        embedding,
        model: ctx.embedding().model().to_string(),
    }))
}

/// Health report; 503 only when the cache check failed outright.
pub async fn healthz(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<HealthReport>) {
    let report = health::check(&ctx).await;
    let status = if report.status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Snapshot of every registered breaker, sorted by name.
pub async fn breakers(State(ctx): State<Arc<AppContext>>) -> Json<Vec<BreakerSnapshot>> {
    Json(ctx.breakers().snapshots())
}

/// Prometheus exposition, or 404 when metrics are disabled.
pub async fn metrics(State(ctx): State<Arc<AppContext>>) -> Response {
    match ctx.metrics() {
        Some(handle) => (
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

pub async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

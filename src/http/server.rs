//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, timeout, body limit, request context)
//! - Serve on a bound listener until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::context::AppContext;
use crate::http::handlers;
use crate::http::request::request_context;

/// HTTP surface of the guard service.
pub struct HttpServer {
    router: Router,
    ctx: Arc<AppContext>,
}

impl HttpServer {
    /// Create a new HTTP server over an initialized context.
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let router = Self::build_router(ctx.clone());
        Self { router, ctx }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(ctx: Arc<AppContext>) -> Router {
        let config = ctx.config();
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let body_limit = config.listener.max_body_bytes;

        Router::new()
            .route("/embed", post(handlers::embed))
            .route("/healthz", get(handlers::healthz))
            .route("/breakers", get(handlers::breakers))
            .route("/metrics", get(handlers::metrics))
            .route("/version", get(handlers::version))
            .with_state(ctx)
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(middleware::from_fn(request_context))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

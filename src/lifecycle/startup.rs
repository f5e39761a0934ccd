//! Startup orchestration.
//!
//! Order: config → logging → metrics recorder → application context →
//! listener. Any failure before the listener is bound is fatal.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{self, GuardConfig};
use crate::context::AppContext;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

/// Fatal startup or serving failure.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Context(#[from] crate::error::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Load configuration from `path` (or defaults) and run until signalled.
pub async fn run(path: Option<&Path>) -> Result<(), StartupError> {
    let config = match path {
        Some(path) => config::load_config(path)?,
        None => GuardConfig::default(),
    };
    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?path,
        "voiceroi-guard starting"
    );

    let metrics_handle = if config.observability.metrics_enabled {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let ctx = AppContext::initialize(config, metrics_handle)?;
    let address = ctx.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let grace = Duration::from_secs(ctx.config().timeouts.shutdown_grace_secs);
    let mut drain_deadline = shutdown.subscribe();
    let serve = HttpServer::new(ctx.clone()).run(listener, shutdown.subscribe());
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => result.map_err(StartupError::Serve)?,
        _ = async {
            let _ = drain_deadline.recv().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(
                grace = ?grace,
                pending = shutdown.receiver_count(),
                "Drain deadline exceeded, forcing exit"
            );
        }
    }

    ctx.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}

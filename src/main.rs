//! VoiceROI dependency guard
//!
//! Wraps the RAG API's two external dependencies in circuit breakers and
//! exposes them over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                voiceroi-guard                │
//!                       │                                              │
//!   POST /embed  ───────┼─▶ http ──▶ services::embedding ──▶ breaker ──┼──▶ embedding provider
//!                       │                                  "embedding" │
//!   GET /healthz ───────┼─▶ http ──▶ health ──▶ services::cache ─▶ breaker ──▶ cache (RESP PING)
//!                       │                                    "redis"   │
//!   GET /metrics ───────┼─▶ observability::metrics (Prometheus)        │
//!   GET /breakers ──────┼─▶ resilience::registry snapshots             │
//!                       │                                              │
//!                       │   config · lifecycle · context (built once)  │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use voiceroi_guard::lifecycle::startup;

#[derive(Parser)]
#[command(name = "voiceroi-guard")]
#[command(about = "Circuit-breaker guard for embedding and cache dependencies", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "VOICEROI_GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match startup::run(args.config.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialized yet; stderr always works.
            eprintln!("voiceroi-guard: {e}");
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::Rng;
use serde_json::{json, Value};

use voiceroi_guard::resilience::backoff::Backoff;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Inspect and smoke-test a running voiceroi-guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the dependency health report
    Health,
    /// Show a snapshot of every circuit breaker
    Breakers,
    /// Print the breaker metrics (or everything with --all)
    Metrics {
        #[arg(long)]
        all: bool,
    },
    /// Send queries through /embed and confirm the breaker counted them
    Verify {
        #[arg(short, long, default_value_t = 5)]
        queries: u32,

        /// Health polls before giving up on a cold service
        #[arg(short, long, default_value_t = 6)]
        attempts: u32,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{base}/healthz")).send().await?;
            print_response(res).await?;
        }
        Commands::Breakers => {
            let res = client.get(format!("{base}/breakers")).send().await?;
            print_response(res).await?;
        }
        Commands::Metrics { all } => {
            let body = scrape(&client, base).await?;
            for line in body.lines() {
                if all || line.contains("voiceroi_circuit") {
                    println!("{line}");
                }
            }
        }
        Commands::Verify { queries, attempts } => {
            return verify(&client, base, queries, attempts).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn verify(
    client: &reqwest::Client,
    base: &str,
    queries: u32,
    attempts: u32,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let backoff = Backoff::default();
    let mut ready = false;
    for attempt in 0..attempts {
        tokio::time::sleep(backoff.delay(attempt)).await;
        match client.get(format!("{base}/healthz")).send().await {
            Ok(res) if res.status().is_success() => {
                ready = true;
                break;
            }
            Ok(res) => eprintln!("healthz returned {} (attempt {})", res.status(), attempt + 1),
            Err(e) => eprintln!("healthz unreachable: {e} (attempt {})", attempt + 1),
        }
    }
    if !ready {
        eprintln!("Error: service never became healthy");
        return Ok(ExitCode::FAILURE);
    }

    // Unique texts so an upstream cache cannot short-circuit the provider.
    let run_id: u32 = rand::thread_rng().gen();
    for i in 0..queries {
        let text = format!("What is the ROI of voice agents for clinic #{run_id}-{i}?");
        let res = client
            .post(format!("{base}/embed"))
            .json(&json!({ "text": text }))
            .send()
            .await?;
        println!("query {}: {}", i + 1, res.status());
    }

    let body = scrape(client, base).await?;
    match embedding_calls(&body) {
        Some(calls) if calls > 0.0 => {
            println!("voiceroi_circuit_calls_total{{name=\"embedding\"}} = {calls}");
            Ok(ExitCode::SUCCESS)
        }
        Some(calls) => {
            eprintln!("Error: embedding breaker recorded {calls} calls");
            Ok(ExitCode::FAILURE)
        }
        None => {
            eprintln!("Error: embedding breaker metric not found");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn scrape(client: &reqwest::Client, base: &str) -> Result<String, Box<dyn std::error::Error>> {
    let res = client.get(format!("{base}/metrics")).send().await?;
    if !res.status().is_success() {
        return Err(format!("metrics endpoint returned {}", res.status()).into());
    }
    Ok(res.text().await?)
}

/// Value of `voiceroi_circuit_calls_total{name="embedding"}` in an exposition body.
fn embedding_calls(body: &str) -> Option<f64> {
    body.lines()
        .filter(|line| line.starts_with("voiceroi_circuit_calls_total{"))
        .filter(|line| line.contains("name=\"embedding\""))
        .find_map(|line| line.rsplit(' ').next()?.parse().ok())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Service returned status {status}");
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}

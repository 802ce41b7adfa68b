use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "memlimiter-cli")]
#[command(about = "Client for the memlimiter allocator demo", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print memory limiter statistics
    Stats,
    /// Generate allocation load and report admission outcomes
    Load {
        /// Total number of requests
        #[arg(long, default_value_t = 1000)]
        requests: u64,
        /// Bytes allocated per request
        #[arg(long, default_value_t = 1024 * 1024)]
        size: u64,
        /// How long each allocation is held
        #[arg(long, default_value_t = 100)]
        duration_ms: u64,
        /// Requests in flight at once
        #[arg(long, default_value_t = 16)]
        concurrency: u64,
    },
}

#[derive(Default)]
struct Outcomes {
    passed: AtomicU64,
    throttled: AtomicU64,
    failed: AtomicU64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Stats => {
            let res = client.get(format!("{}/stats", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Load {
            requests,
            size,
            duration_ms,
            concurrency,
        } => {
            let outcomes = Arc::new(Outcomes::default());
            let concurrency = concurrency.max(1);

            let workers = (0..concurrency).map(|worker| {
                let client = client.clone();
                let url = format!("{}/allocate", cli.url);
                let outcomes = outcomes.clone();
                // Spread the remainder over the first workers.
                let share = requests / concurrency + u64::from(worker < requests % concurrency);

                async move {
                    for _ in 0..share {
                        let res = client
                            .post(&url)
                            .json(&json!({ "size": size, "duration_ms": duration_ms }))
                            .send()
                            .await;

                        let counter = match res {
                            Ok(res) if res.status().is_success() => &outcomes.passed,
                            Ok(res) if res.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                                &outcomes.throttled
                            }
                            _ => &outcomes.failed,
                        };
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });

            join_all(workers).await;

            let summary = json!({
                "passed": outcomes.passed.load(Ordering::Relaxed),
                "throttled": outcomes.throttled.load(Ordering::Relaxed),
                "failed": outcomes.failed.load(Ordering::Relaxed),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

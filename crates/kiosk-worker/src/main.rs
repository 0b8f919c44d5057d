//! Kiosk clip worker binary.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*};

use kiosk_worker::logging::log_filter;
use kiosk_worker::{run_job, Cli, WorkerConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = log_filter(std::env::var("RUST_LOG").ok().as_deref());

    // Logs go to stderr; stdout carries the JSON report.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting kiosk-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let (report, exit_code) = match run_job(&config, &cli).await {
        Ok(report) => (report, 0),
        Err((report, e)) => (report, e.exit_code()),
    };

    match serde_json::to_string(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize job report: {}", e),
    }

    std::process::exit(exit_code);
}

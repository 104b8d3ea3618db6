use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use trawler::config::Config;
use trawler::crawler::Crawler;

#[derive(Parser)]
#[command(
    name = "trawler",
    version,
    about = "Queue-driven web crawler worker",
    long_about = None
)]
struct Cli {
    /// Process a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Worker ID for log correlation (default: random)
    #[arg(long)]
    worker_id: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("invalid configuration")?;
    setup_tracing(&config.log_format, cli.verbose);

    let worker_id = cli.worker_id.unwrap_or_else(generate_worker_id);
    let span = tracing::info_span!("worker", id = %worker_id);

    let mut crawler = Crawler::from_env(config)
        .await
        .context("failed to initialize crawler")?;

    if cli.once {
        let count = crawler.poll_once().instrument(span.clone()).await?;
        tracing::info!(count, "single poll complete");
        return Ok(());
    }

    tracing::info!(worker = %worker_id, "starting continuous polling");
    tokio::select! {
        result = crawler.run().instrument(span) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!(worker = %worker_id, "shutdown signal received, stopping");
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn generate_worker_id() -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

//! floorwatch - identifies sightings against the employee roster and
//! tracks who is present at each location.
//!
//! Requests are read as JSON lines on stdin and answered as JSON lines on
//! stdout; logs go to stderr.

mod config;
mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use floorwatch_monitor::Monitor;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "floorwatch")]
#[command(about = "Roster matching and per-location presence tracking")]
struct Args {
    /// Config file (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory service base URL (overrides the config file)
    #[arg(long)]
    directory_url: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let file = match &args.config {
        Some(path) => config::load(path)?,
        None => config::FileConfig::default(),
    };
    let source = file.directory_source(args.directory_url.as_deref())?;
    let (monitor, tasks) = Monitor::start(file.monitor_config()?, source);
    for (source, location_id) in &file.locations {
        monitor.locations().assign(source.clone(), *location_id);
    }
    info!(sources = file.locations.len(), "ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let mut out = session::handle_line(&monitor, &line).await;
        out.push('\n');
        if let Err(e) = stdout.write_all(out.as_bytes()).await {
            warn!(error = %e, "stdout closed");
            break;
        }
        stdout.flush().await?;
    }

    tasks.shutdown().await;
    Ok(())
}

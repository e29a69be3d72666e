//! cast-send - Publish scheduled casts
//!
//! Runs the scheduled-post publisher either once (for an external cron) or
//! as a long-running polling daemon.

use clap::Parser;
use libcastflow::logging::LoggingConfig;
use libcastflow::{CastFlowError, Config, Publisher, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cast-send")]
#[command(version)]
#[command(about = "Publish scheduled casts")]
#[command(long_about = "\
cast-send - Publish scheduled casts

DESCRIPTION:
    cast-send finds scheduled casts whose time has come and publishes them
    through Neynar on behalf of their authors. Each due cast is attempted
    exactly once; the outcome (posted or failed) is written back to the
    database. Failed casts are not retried automatically; use
    `cast-queue retry` to put one back in the queue.

USAGE:
    # Process due casts once and exit (for cron / systemd timers)
    cast-send --once

    # Run as a daemon, polling every 60 seconds
    cast-send --poll-interval 60

    # Enable verbose logging
    cast-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current batch)

CONFIGURATION:
    Configuration file: ~/.config/cast-flow/config.toml
    Override with CAST_FLOW_CONFIG.

    [neynar]
    api_key = \"...\"                # or NEYNAR_API_KEY

    [publisher]
    request_timeout_secs = 30
    poll_interval_secs = 300

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime or configuration error
    2 - Authentication error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due casts once, print the report as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        error!("cast-send failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let publisher = Publisher::from_config(&config).await?;

    info!("cast-send starting");

    if cli.once {
        let report = publisher.process_due_posts_now().await?;
        let json = serde_json::to_string(&report)
            .map_err(|e| CastFlowError::InvalidInput(format!("Failed to encode report: {}", e)))?;
        println!("{}", json);
        info!("cast-send: processed due casts once, exiting");
    } else {
        let poll_interval = cli
            .poll_interval
            .unwrap_or(config.publisher.poll_interval_secs)
            .max(1);
        info!("Poll interval: {}s", poll_interval);

        let shutdown = Arc::new(AtomicBool::new(false));
        setup_signal_handlers(shutdown.clone())?;
        run_daemon_loop(&publisher, poll_interval, shutdown).await;
    }

    info!("cast-send stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| CastFlowError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping after the current batch...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

async fn run_daemon_loop(publisher: &Publisher, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        // A failed batch (store unreachable) is logged and retried next poll
        if let Err(e) = publisher.process_due_posts_now().await {
            error!("Error processing scheduled casts: {}", e);
        }

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

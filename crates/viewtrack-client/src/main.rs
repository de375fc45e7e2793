//! Viewtrack - command-line driver for the instrumentation client.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use event_outbox::TokioScheduler;
use tracing::info;
use viewtrack_client::{InstrumentationClient, PageViewOutcome};
use viewtrack_config_and_utils::{init_logging, Config, Paths};

/// Viewtrack command-line interface.
#[derive(Parser)]
#[command(name = "viewtrack")]
#[command(about = "Record browsing events and deliver them to the viewtrack collector")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (config, storage, logs). Defaults to ~/.viewtrack
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a participant code
    Login {
        /// Participant code issued for the study
        code: String,
    },
    /// Sign out and discard all queued events
    Logout,
    /// Record a page view
    PageView {
        /// Page URL
        #[arg(long)]
        url: String,
        /// Referrer URL
        #[arg(long)]
        referrer: Option<String>,
    },
    /// Retry queued events now
    Flush,
    /// Show identity and queue status
    Status,
    /// Keep retrying queued events until interrupted
    Run,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    // Initialize logging
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(log_level, &paths);

    let client = InstrumentationClient::from_config(&config, &paths)?;

    match cli.command {
        Commands::Login { code } => {
            client.set_auth(&code)?;
            match client.get_config().await {
                Ok(participant_config) => {
                    info!(keys = participant_config.0.len(), "Fetched participant config")
                }
                Err(err) => info!(error = %err, "Participant config unavailable"),
            }
            println!("Signed in as {}", code.trim());
        }
        Commands::Logout => {
            client.logout();
            println!("Signed out");
        }
        Commands::PageView { url, referrer } => {
            if client.get_auth().is_none() {
                println!("Not signed in; run `viewtrack login <code>` first");
                return Ok(());
            }
            client.set_page(Some(url), referrer);
            match client.send_page_view().await {
                PageViewOutcome::Delivered => println!("Page view delivered"),
                PageViewOutcome::Queued => println!("Page view queued for retry"),
                PageViewOutcome::NotSent => {
                    println!("Page view not sent; the collector could not open a session")
                }
            }
        }
        Commands::Flush => {
            let report = client.flush().await;
            println!(
                "attempted={} delivered={} dropped={} remaining={}",
                report.attempted, report.delivered, report.dropped, report.remaining
            );
        }
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&client.queue_status())?);
        }
        Commands::Run => {
            client.start(&TokioScheduler);
            info!(
                period_secs = config.retry_period_secs,
                "Retrying queued events, press Ctrl-C to stop"
            );
            tokio::signal::ctrl_c().await?;
            client.stop();
        }
    }

    Ok(())
}

//! HealthBuddy CLI - Command-line interface for the HealthBuddy sync engine
//!
//! Provides commands for:
//! - Viewing sync status and the pending queue
//! - Triggering a sync now
//! - Inspecting the local mirror
//! - Viewing and validating configuration
//! - Running the engine in the foreground

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod reachability;

use commands::{
    config::ConfigCommand, mirror::MirrorCommand, queue::QueueCommand, run::RunCommand,
    status::StatusCommand, sync::SyncCommand, AppContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "healthbuddy", version, about = "Offline-first sync for HealthBuddy")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show sync status
    Status(StatusCommand),
    /// Send queued changes now
    Sync(SyncCommand),
    /// Inspect and manage the outbound queue
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Inspect locally mirrored entities
    #[command(subcommand)]
    Mirror(MirrorCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Run the sync engine until interrupted
    Run(RunCommand),
}

/// Log filter from `-v` flags, falling back to the configured level
fn log_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = AppContext::load(cli.config.as_deref());

    let filter = log_filter(cli.verbose, &ctx.config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Status(cmd) => cmd.execute(&ctx, format).await,
        Commands::Sync(cmd) => cmd.execute(&ctx, format).await,
        Commands::Queue(cmd) => cmd.execute(&ctx, format).await,
        Commands::Mirror(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(cmd) => cmd.execute(&ctx, format).await,
        Commands::Run(cmd) => cmd.execute(&ctx, format).await,
    }
}

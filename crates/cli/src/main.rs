//! Treesync CLI - tsync command

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod cmd;
mod display;
mod system_config;
mod util;

/// Treesync - keep a live tree in sync with a virtual tree
#[derive(Parser)]
#[command(name = "tsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes needed to bring the live tree in line
    Diff {
        /// Virtual tree snapshot (JSON)
        virtual_tree: PathBuf,
        /// Live tree dump (JSON)
        live_tree: PathBuf,
        /// Print the patch as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply the changes to the live tree dump
    Apply {
        /// Virtual tree snapshot (JSON)
        virtual_tree: PathBuf,
        /// Live tree dump (JSON), created if missing
        live_tree: PathBuf,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
        /// Show the changes without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-sync whenever the virtual tree changes
    Watch {
        /// Virtual tree snapshot (JSON)
        virtual_tree: PathBuf,
        /// Live tree dump (JSON), created if missing
        live_tree: PathBuf,
        /// Polling interval in milliseconds (default: from config)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all configuration values
    List,
    /// Get a single value (e.g. sync.auto_accept)
    Get { key: String },
    /// Set a single value
    Set { key: String, value: String },
    /// Show the config file location
    Path {
        /// Create the file with defaults if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an example config file
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Diff { virtual_tree, live_tree, json } => {
            cmd::diff::run(&virtual_tree, &live_tree, json).await
        }
        Commands::Apply { virtual_tree, live_tree, yes, dry_run } => {
            cmd::apply::run(&virtual_tree, &live_tree, yes, dry_run).await
        }
        Commands::Watch { virtual_tree, live_tree, interval_ms } => {
            cmd::watch::run(&virtual_tree, &live_tree, interval_ms).await
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list().await,
            ConfigCommands::Get { key } => cmd::config::run_get(&key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}

//! Trellis CLI - Main entry point

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis_foundation::TrellisConfig;

/// Trellis - extension manager for Trellis hosts
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Override the data directory (database, media, static)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Add an extension search path
    #[arg(long = "extensions", value_name = "DIR")]
    extension_dirs: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed extensions
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one extension with its requirements and dependents
    Show {
        /// Extension ID (module.path.ClassName)
        id: String,
    },
    /// Enable an extension and everything it requires
    Enable { id: String },
    /// Disable an extension and everything that depends on it
    Disable { id: String },
    /// Rediscover extensions from scratch
    Reload,
    /// Install an extension package and reload
    Install {
        /// Package directory containing extension.json
        source: String,
        /// Distribution name declared by the package
        package: String,
    },
    /// Show sync generation, routes and middleware
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let mut config = TrellisConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        TrellisConfig::default()
    });
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }
    if !args.extension_dirs.is_empty() {
        config.extension_dirs = args.extension_dirs;
    }
    tracing::debug!("Using data directory {}", config.data_dir().display());

    let manager = commands::build_manager(&config)?;
    manager.load(false).await?;

    match args.command {
        Command::List { json } => commands::list(&manager, json).await,
        Command::Show { id } => commands::show(&manager, &id).await,
        Command::Enable { id } => commands::enable(&manager, &id).await,
        Command::Disable { id } => commands::disable(&manager, &id).await,
        Command::Reload => commands::reload(&manager).await,
        Command::Install { source, package } => {
            commands::install(&manager, &source, &package).await
        }
        Command::Status => commands::status(&manager).await,
    }
}

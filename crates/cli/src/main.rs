//! tabletalk CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP API server
//! - `migrate` — Create or update the database schema

use std::path::Path;

use clap::{Parser, Subcommand};

use tabletalk_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "tabletalk",
    about = "tabletalk — a database-aware chat assistant backend",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the listening port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create or update the database schema
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_path(Path::new(path))?,
        None => AppConfig::load()?,
    };

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Migrate => commands::migrate::run(config).await?,
    }

    Ok(())
}

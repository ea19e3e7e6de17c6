//! Stream tracker - buffer newline-delimited JSON events and deliver them to a collector.

mod app;
mod dead_letter;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracker_config_and_utils::{init_logging, Config, LogConfig, Paths};

/// Stream tracker command-line interface.
#[derive(Parser)]
#[command(name = "stream-tracker")]
#[command(about = "Buffer events and deliver them to a stream collector")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, logs and the dead-letter file. Defaults to ~/.stream-tracker
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Track newline-delimited JSON events until EOF or a termination signal
    Track {
        /// Destination stream
        #[arg(short, long)]
        stream: String,
        /// Read events from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Accept batches locally without contacting the collector
        #[arg(long)]
        dry_run: bool,
    },
    /// Send one event immediately
    Put {
        /// Destination stream
        #[arg(short, long)]
        stream: String,
        /// Event as JSON
        #[arg(short, long)]
        data: String,
        /// Send as a GET query instead of a POST body
        #[arg(long)]
        get: bool,
    },
    /// Check whether the collector is up
    Health,
    /// Re-send batches from the dead-letter file
    Replay,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    // Initialize logging
    init_logging(&LogConfig {
        default_level: config.log_level.clone(),
        format: config.log_format,
        log_file: Some(paths.log_file()),
        ..Default::default()
    })?;

    match cli.command {
        Commands::Track {
            stream,
            file,
            dry_run,
        } => {
            let opts = app::TrackOptions {
                stream,
                file,
                dry_run,
            };
            app::run_track(&config, &paths, opts).await?;
        }
        Commands::Put { stream, data, get } => {
            app::run_put(&config, &stream, &data, get).await?;
        }
        Commands::Health => {
            app::run_health(&config).await?;
        }
        Commands::Replay => {
            app::run_replay(&config, &paths).await?;
        }
    }

    Ok(())
}

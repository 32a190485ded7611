//! racetrack CLI.
//!
//! Replays a recorded event trace through the FastTrack race detector.
//!
//! # Quick Start
//!
//! ```bash
//! # One JSON event per line
//! racetrack replay trace.jsonl
//!
//! # Same, with sampling configured in ./project/racetrack.toml
//! racetrack replay trace.jsonl --config ./project --format json
//!
//! # Show the effective configuration
//! racetrack config --format toml
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

/// racetrack - dynamic data-race detection over recorded event traces.
#[derive(Parser)]
#[command(name = "racetrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Replay an event trace and report races.
    Replay {
        /// Trace file with one JSON event per line.
        trace: PathBuf,

        /// Project directory holding racetrack.toml (defaults to the current directory).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,

        /// Log every event at trace level.
        #[arg(long)]
        trace_events: bool,

        /// Exit with an error if any race is reported.
        #[arg(long)]
        deny_races: bool,
    },

    /// Show the effective configuration.
    Config {
        /// Project directory holding racetrack.toml (defaults to the current directory).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: ConfigFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ConfigFormat {
    Text,
    Toml,
    Json,
}

fn main() -> Result<()> {
    // Logs go to stderr so JSON output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Replay {
            trace,
            config,
            format,
            trace_events,
            deny_races,
        } => commands::replay::run(
            &trace,
            config.as_deref(),
            format,
            commands::replay::Options {
                trace_events,
                deny_races,
            },
        ),
        Commands::Config { config, format } => commands::config::show(config.as_deref(), format),
    }
}

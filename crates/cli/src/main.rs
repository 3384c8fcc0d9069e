//! Metricwatch CLI
//!
//! Evaluates metric windows against thresholds, either one-off or for a
//! batch of configured monitors, and reduces exported statistics files.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{check, reduce, run, validate};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Metricwatch CLI
#[derive(Parser)]
#[command(name = "mwatch")]
#[command(author, version, about = "Metric window threshold checks", long_about = None)]
pub struct Cli {
    /// Monitor configuration file (defaults to ~/.config/metricwatch/monitors.toml)
    #[arg(long, short, env = "METRICWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate every configured monitor once
    Run {
        /// Exit with status 2 when any monitor triggered
        #[arg(long)]
        exit_on_findings: bool,
    },

    /// Evaluate a single metric against a threshold
    Check(check::CheckArgs),

    /// Reduce a local CloudWatch statistics file to one value
    Reduce(reduce::ReduceArgs),

    /// Validate the configuration and list monitors
    Validate,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "error" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Run { exit_on_findings } => {
            let path = config::resolve_config_path(cli.config)?;
            run::run_batch(&path, exit_on_findings, cli.format).await
        }
        Commands::Check(args) => check::check(args, cli.format).await,
        Commands::Reduce(args) => reduce::reduce_file(args, cli.format).await,
        Commands::Validate => {
            let path = config::resolve_config_path(cli.config)?;
            validate::validate(&path, cli.format)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

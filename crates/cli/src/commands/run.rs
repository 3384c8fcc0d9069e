//! `mwatch run`: evaluate every configured monitor once

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing::debug;
use watch_lib::{
    sources::create_source, BatchEvaluator, MetricWindowFetcher, StructuredLogger, WatchConfig,
};

use super::{cancel_on_ctrl_c, exit_code};
use crate::output::{print_report, OutputFormat};

pub async fn run_batch(
    config_path: &Path,
    exit_on_findings: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let config = WatchConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let monitors = config.monitor_specs()?;
    debug!(monitors = monitors.len(), "Loaded configuration");

    let fetch_config = config.fetch.fetch_config();
    let source = create_source(&config.source, fetch_config.attempt_timeout)?;
    let evaluator = BatchEvaluator::new(
        MetricWindowFetcher::new(source, fetch_config),
        config.fetch.batch_config(),
        StructuredLogger::new("mwatch"),
    );

    let report = evaluator.run(&monitors, &cancel_on_ctrl_c()).await;
    print_report(&report, format)?;

    Ok(exit_code(&report, exit_on_findings))
}

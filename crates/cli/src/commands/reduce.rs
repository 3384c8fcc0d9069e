//! `mwatch reduce`: reduce a local CloudWatch statistics file

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use watch_lib::{fetcher::DEFAULT_SOURCE_STATISTIC, sources::parse_statistics, StatisticKind};

use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct ReduceArgs {
    /// File with a GetMetricStatistics-shaped JSON body
    pub file: PathBuf,

    /// sum, average, min, max or percentile
    #[arg(long)]
    pub statistic: StatisticKind,

    /// Percentile rank in (0, 100], required for the percentile statistic
    #[arg(long)]
    pub percentile: Option<f64>,

    /// Statistic field to read from each datapoint
    #[arg(long, default_value = DEFAULT_SOURCE_STATISTIC)]
    pub field: String,
}

pub async fn reduce_file(args: ReduceArgs, format: OutputFormat) -> Result<ExitCode> {
    let body = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let datapoints = parse_statistics(&body, &args.field)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;
    let statistic = watch_lib::reduce(&datapoints, args.statistic, args.percentile)?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "statistic": statistic,
                "datapoints": datapoints.len(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        // Bare full-precision value so the output can be captured by shell scripts
        OutputFormat::Table => println!("{}", statistic.value),
    }

    Ok(ExitCode::SUCCESS)
}

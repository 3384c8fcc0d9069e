//! `mwatch check`: one-off evaluation of a single metric

use anyhow::Result;
use clap::{ArgGroup, Args};
use std::path::PathBuf;
use std::process::ExitCode;
use watch_lib::{
    config::{FetchSettings, MonitorConfig, SourceConfig, WindowDefaults},
    sources::create_source,
    BatchEvaluator, MetricWindowFetcher, StructuredLogger,
};

use super::{cancel_on_ctrl_c, exit_code};
use crate::output::{print_report, OutputFormat};

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["source_dir", "endpoint"])))]
pub struct CheckArgs {
    /// Resource identifier (instance id, load balancer name, ...)
    #[arg(long)]
    pub resource: String,

    /// Metric name, e.g. CPUUtilization
    #[arg(long)]
    pub metric: String,

    /// sum, average, min, max or percentile
    #[arg(long)]
    pub statistic: String,

    /// Percentile rank in (0, 100], required for the percentile statistic
    #[arg(long)]
    pub percentile: Option<f64>,

    /// gt, lt, ge, le or eq
    #[arg(long)]
    pub comparator: String,

    #[arg(long, allow_hyphen_values = true)]
    pub threshold: f64,

    /// Lookback window in seconds
    #[arg(long, default_value_t = 3600)]
    pub lookback: u64,

    /// Sampling period in seconds
    #[arg(long, default_value_t = 300)]
    pub period: u64,

    /// Read exports from `<dir>/<resource>/<metric>.json`
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Query `<endpoint>/v1/datapoints`
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Upstream statistic field to read from each datapoint
    #[arg(long, default_value = "Average")]
    pub field: String,

    /// Per-attempt fetch timeout in milliseconds
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,

    /// Retries after the first failed fetch attempt
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Exit with status 2 when the threshold is breached
    #[arg(long)]
    pub exit_on_findings: bool,
}

impl CheckArgs {
    fn source_config(&self) -> Result<SourceConfig> {
        match (&self.source_dir, &self.endpoint) {
            (Some(root), _) => Ok(SourceConfig::File {
                root: root.clone(),
                statistic_field: self.field.clone(),
            }),
            (None, Some(endpoint)) => Ok(SourceConfig::Http {
                endpoint: endpoint.clone(),
                statistic_field: self.field.clone(),
            }),
            (None, None) => anyhow::bail!("either --source-dir or --endpoint is required"),
        }
    }

    fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
            ..FetchSettings::default()
        }
    }

    fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            name: format!("{}/{}", self.resource, self.metric),
            resource_id: self.resource.clone(),
            metric: self.metric.clone(),
            statistic: self.statistic.clone(),
            percentile_rank: self.percentile,
            comparator: self.comparator.clone(),
            threshold: self.threshold,
            lookback_seconds: Some(self.lookback),
            period_seconds: Some(self.period),
            source_statistic: None,
        }
    }
}

pub async fn check(args: CheckArgs, format: OutputFormat) -> Result<ExitCode> {
    let source_config = args.source_config()?;
    let spec = args
        .monitor_config()
        .to_spec(&WindowDefaults::default(), source_config.statistic_field())?;

    let settings = args.fetch_settings();
    let fetch_config = settings.fetch_config();
    let source = create_source(&source_config, fetch_config.attempt_timeout)?;
    let evaluator = BatchEvaluator::new(
        MetricWindowFetcher::new(source, fetch_config),
        settings.batch_config(),
        StructuredLogger::new("mwatch"),
    );

    let report = evaluator.run(&[spec], &cancel_on_ctrl_c()).await;
    print_report(&report, format)?;

    Ok(exit_code(&report, args.exit_on_findings))
}

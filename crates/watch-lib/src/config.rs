//! Monitor configuration
//!
//! Loaded with the `config` crate from a TOML/JSON/YAML file layered with
//! `METRICWATCH__`-prefixed environment variables, then validated into
//! typed [`MonitorSpec`]s.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::BatchConfig;
use crate::error::{Result, WatchError};
use crate::fetcher::{FetchConfig, DEFAULT_SOURCE_STATISTIC};
use crate::models::{Comparator, StatisticKind, ThresholdRule};
use crate::monitor::MonitorSpec;
use crate::stats::validate_percentile_rank;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "METRICWATCH";

/// Where datapoints come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Exported statistics under `<root>/<resource_id>/<metric>.json`
    File {
        root: PathBuf,
        #[serde(default = "default_statistic_field")]
        statistic_field: String,
    },
    /// Remote endpoint serving `GET /v1/datapoints`
    Http {
        endpoint: String,
        #[serde(default = "default_statistic_field")]
        statistic_field: String,
    },
}

impl SourceConfig {
    pub fn statistic_field(&self) -> &str {
        match self {
            SourceConfig::File {
                statistic_field, ..
            }
            | SourceConfig::Http {
                statistic_field, ..
            } => statistic_field,
        }
    }
}

fn default_statistic_field() -> String {
    DEFAULT_SOURCE_STATISTIC.to_string()
}

/// Fetch and fan-out settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_concurrency: usize,
    pub batch_deadline_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            max_concurrency: 8,
            batch_deadline_secs: 120,
        }
    }
}

impl FetchSettings {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            attempt_timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_concurrency: self.max_concurrency,
            deadline: Duration::from_secs(self.batch_deadline_secs),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(WatchError::invalid("fetch.timeout_ms must be positive"));
        }
        if self.max_concurrency == 0 {
            return Err(WatchError::invalid("fetch.max_concurrency must be positive"));
        }
        if self.batch_deadline_secs == 0 {
            return Err(WatchError::invalid("fetch.batch_deadline_secs must be positive"));
        }
        Ok(())
    }
}

/// Window defaults for monitors that do not set their own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowDefaults {
    pub lookback_seconds: u64,
    pub period_seconds: u64,
}

impl Default for WindowDefaults {
    fn default() -> Self {
        Self {
            lookback_seconds: 3600,
            period_seconds: 300,
        }
    }
}

/// One monitor as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub name: String,
    pub resource_id: String,
    pub metric: String,
    pub statistic: String,
    #[serde(default)]
    pub percentile_rank: Option<f64>,
    pub comparator: String,
    pub threshold: f64,
    #[serde(default)]
    pub lookback_seconds: Option<u64>,
    #[serde(default)]
    pub period_seconds: Option<u64>,
    /// Upstream statistic field, overriding the source default
    #[serde(default)]
    pub source_statistic: Option<String>,
}

impl MonitorConfig {
    /// Validate into a typed monitor
    pub fn to_spec(&self, defaults: &WindowDefaults, source_statistic: &str) -> Result<MonitorSpec> {
        let context = |e: WatchError| match e {
            WatchError::InvalidArgument(msg) => {
                WatchError::InvalidArgument(format!("monitor '{}': {msg}", self.name))
            }
            other => other,
        };

        if self.name.trim().is_empty() {
            return Err(WatchError::invalid("monitor name must not be empty"));
        }
        if !self.threshold.is_finite() {
            return Err(context(WatchError::invalid("threshold must be finite")));
        }

        let statistic: StatisticKind = self.statistic.parse().map_err(context)?;
        let comparator: Comparator = self.comparator.parse().map_err(context)?;

        let percentile_rank = match statistic {
            StatisticKind::Percentile => {
                let rank = self.percentile_rank.ok_or_else(|| {
                    context(WatchError::invalid("percentile statistic requires percentile_rank"))
                })?;
                validate_percentile_rank(rank).map_err(context)?;
                Some(rank)
            }
            _ => None,
        };

        let lookback_seconds = self.lookback_seconds.unwrap_or(defaults.lookback_seconds);
        let period_seconds = self.period_seconds.unwrap_or(defaults.period_seconds);
        if lookback_seconds == 0 {
            return Err(context(WatchError::invalid("lookback_seconds must be positive")));
        }
        if period_seconds == 0 {
            return Err(context(WatchError::invalid("period_seconds must be positive")));
        }

        Ok(MonitorSpec {
            name: self.name.clone(),
            resource_id: self.resource_id.clone(),
            metric: self.metric.clone(),
            statistic,
            percentile_rank,
            rule: ThresholdRule::new(comparator, self.threshold),
            lookback: Duration::from_secs(lookback_seconds),
            period: Duration::from_secs(period_seconds),
            source_statistic: self
                .source_statistic
                .clone()
                .unwrap_or_else(|| source_statistic.to_string()),
        })
    }
}

/// Complete configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub defaults: WindowDefaults,
    #[serde(default)]
    pub monitors: Vec<MonitorConfig>,
}

impl WatchConfig {
    /// Load configuration from a file plus environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from an in-memory string
    pub fn parse_str(contents: &str, format: config::FileFormat) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(contents, format))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate every monitor and return them in file order
    pub fn monitor_specs(&self) -> Result<Vec<MonitorSpec>> {
        self.fetch.validate()?;

        if self.monitors.is_empty() {
            return Err(WatchError::invalid("no monitors configured"));
        }

        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(self.monitors.len());
        for monitor in &self.monitors {
            if !seen.insert(monitor.name.as_str()) {
                return Err(WatchError::invalid(format!(
                    "duplicate monitor name '{}'",
                    monitor.name
                )));
            }
            specs.push(monitor.to_spec(&self.defaults, self.source.statistic_field())?);
        }
        Ok(specs)
    }
}

//! Metric sources
//!
//! A source answers one question: which datapoints does a metric have for a
//! resource within a time range. Both built-in sources read payloads shaped
//! like CloudWatch `GetMetricStatistics` responses:
//! - [`FileSource`] reads exported responses from a directory tree
//! - [`HttpSource`] queries a remote metrics endpoint

mod cloudwatch;
mod file;
mod http;

pub use cloudwatch::{parse_statistics, RawDatapoint, StatisticsResponse};
pub use file::FileSource;
pub use http::HttpSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::{Result, SourceError};
use crate::models::Datapoint;

/// A single request against a metrics source
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub resource_id: String,
    pub metric_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_seconds: u64,
    /// Upstream statistic field to read from each datapoint (e.g. `Average`)
    pub statistic: String,
}

impl MetricQuery {
    /// Whether a timestamp lies inside the queried range (inclusive)
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start && *timestamp <= self.end
    }
}

/// Trait for metric source implementations
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch the raw datapoints for a query; order is not guaranteed
    async fn get_datapoints(
        &self,
        query: &MetricQuery,
    ) -> std::result::Result<Vec<Datapoint>, SourceError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Create the source described by the configuration
pub fn create_source(config: &SourceConfig, timeout: Duration) -> Result<Arc<dyn MetricsSource>> {
    match config {
        SourceConfig::File { root, .. } => {
            tracing::info!(root = %root.display(), "Using file metrics source");
            Ok(Arc::new(FileSource::new(root)))
        }
        SourceConfig::Http { endpoint, .. } => {
            tracing::info!(endpoint = %endpoint, "Using HTTP metrics source");
            Ok(Arc::new(HttpSource::new(endpoint, timeout)?))
        }
    }
}

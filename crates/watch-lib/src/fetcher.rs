//! Metric window fetching with timeout, retry and cancellation
//!
//! Wraps a [`MetricsSource`] so that:
//! - every attempt is bounded by an explicit timeout
//! - transient failures are retried with exponential backoff
//! - an in-flight attempt or backoff sleep stops as soon as the caller cancels
//! - exhausted retries surface as `UpstreamUnavailable`, never as an empty window

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SourceError, WatchError};
use crate::models::{Datapoint, MetricWindow};
use crate::observability::WatchMetrics;
use crate::sources::{MetricQuery, MetricsSource};

/// Upstream statistic read when a request does not name one
pub const DEFAULT_SOURCE_STATISTIC: &str = "Average";

/// Configuration for the window fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Timeout of a single source request
    pub attempt_timeout: Duration,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry
    pub base_delay: Duration,
    /// Upper bound for the backoff delay
    pub max_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(10),
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl FetchConfig {
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Total number of attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

/// What to fetch: one metric of one resource over a lookback window
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub resource_id: String,
    pub metric_name: String,
    pub lookback: Duration,
    pub period: Duration,
    /// End of the window; `None` means now
    pub end: Option<DateTime<Utc>>,
    /// Upstream statistic field; `None` means [`DEFAULT_SOURCE_STATISTIC`]
    pub source_statistic: Option<String>,
}

impl FetchRequest {
    pub fn new(
        resource_id: impl Into<String>,
        metric_name: impl Into<String>,
        lookback: Duration,
        period: Duration,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            metric_name: metric_name.into(),
            lookback,
            period,
            end: None,
            source_statistic: None,
        }
    }

    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_source_statistic(mut self, statistic: impl Into<String>) -> Self {
        self.source_statistic = Some(statistic.into());
        self
    }

    /// Reject non-positive windows and periods.
    ///
    /// A period longer than the lookback is accepted; the source then
    /// returns at most one datapoint.
    pub fn validate(&self) -> Result<()> {
        if self.resource_id.trim().is_empty() {
            return Err(WatchError::invalid("resource id must not be empty"));
        }
        if self.metric_name.trim().is_empty() {
            return Err(WatchError::invalid("metric name must not be empty"));
        }
        if self.lookback.as_secs() == 0 {
            return Err(WatchError::invalid("lookback must be at least one second"));
        }
        if self.period.as_secs() == 0 {
            return Err(WatchError::invalid("period must be at least one second"));
        }
        Ok(())
    }

    fn to_query(&self) -> Result<MetricQuery> {
        let end = self.end.unwrap_or_else(Utc::now);
        let lookback = chrono::Duration::from_std(self.lookback)
            .map_err(|_| WatchError::invalid("lookback is too large"))?;
        let start = end
            .checked_sub_signed(lookback)
            .ok_or_else(|| WatchError::invalid("lookback reaches before the representable range"))?;

        Ok(MetricQuery {
            resource_id: self.resource_id.clone(),
            metric_name: self.metric_name.clone(),
            start,
            end,
            period_seconds: self.period.as_secs(),
            statistic: self
                .source_statistic
                .clone()
                .unwrap_or_else(|| DEFAULT_SOURCE_STATISTIC.to_string()),
        })
    }
}

/// Retrieves metric windows from an injected source
#[derive(Clone)]
pub struct MetricWindowFetcher {
    source: Arc<dyn MetricsSource>,
    config: FetchConfig,
    metrics: WatchMetrics,
}

impl MetricWindowFetcher {
    pub fn new(source: Arc<dyn MetricsSource>, config: FetchConfig) -> Self {
        Self {
            source,
            config,
            metrics: WatchMetrics::new(),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch the window described by `request`.
    ///
    /// Returns a possibly empty window. Fails with `InvalidArgument` for a
    /// malformed request, `Cancelled` when `cancel` fires, and
    /// `UpstreamUnavailable` once every attempt has failed.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<MetricWindow> {
        request.validate()?;
        let query = request.to_query()?;
        let max_attempts = self.config.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(WatchError::Cancelled);
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WatchError::Cancelled),
                res = tokio::time::timeout(
                    self.config.attempt_timeout,
                    self.source.get_datapoints(&query),
                ) => res,
            };
            self.metrics
                .observe_fetch_latency(started.elapsed().as_secs_f64());

            let error = match outcome {
                Ok(Ok(datapoints)) => match build_window(&query, datapoints) {
                    Ok(window) => {
                        debug!(
                            resource_id = %query.resource_id,
                            metric = %query.metric_name,
                            datapoints = window.len(),
                            attempt = attempt,
                            "Fetched metric window"
                        );
                        return Ok(window);
                    }
                    Err(e) => e,
                },
                Ok(Err(e)) => e,
                Err(_) => SourceError::Unreachable(format!(
                    "request timed out after {}ms",
                    self.config.attempt_timeout.as_millis()
                )),
            };
            last_error = error.to_string();

            if attempt < max_attempts {
                let delay = self.config.backoff_for(attempt);
                warn!(
                    source = %self.source.name(),
                    resource_id = %query.resource_id,
                    metric = %query.metric_name,
                    attempt = attempt,
                    error = %error,
                    backoff_ms = delay.as_millis() as u64,
                    "Metric fetch failed, retrying"
                );
                self.metrics.inc_fetch_retries();

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(WatchError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        self.metrics.inc_upstream_failures();
        Err(WatchError::UpstreamUnavailable {
            resource_id: query.resource_id,
            metric: query.metric_name,
            attempts: max_attempts,
            reason: last_error,
        })
    }
}

/// Sort datapoints and reject values no reducer could use
fn build_window(
    query: &MetricQuery,
    mut datapoints: Vec<Datapoint>,
) -> std::result::Result<MetricWindow, SourceError> {
    if let Some(bad) = datapoints.iter().find(|d| !d.value.is_finite()) {
        return Err(SourceError::Malformed(format!(
            "non-finite value at {}",
            bad.timestamp.to_rfc3339()
        )));
    }
    datapoints.sort_by_key(|d| d.timestamp);

    Ok(MetricWindow {
        resource_id: query.resource_id.clone(),
        metric_name: query.metric_name.clone(),
        period_seconds: query.period_seconds,
        start: query.start,
        end: query.end,
        datapoints,
    })
}

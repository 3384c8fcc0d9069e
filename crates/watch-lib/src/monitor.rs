//! Single-monitor pipeline: fetch → reduce → evaluate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, WatchError};
use crate::fetcher::{FetchRequest, MetricWindowFetcher};
use crate::models::{MetricWindow, ReducedStatistic, StatisticKind, ThresholdRule, Verdict};
use crate::stats::reduce;
use crate::threshold::evaluate;

/// A validated monitor: what to fetch, how to reduce it, when to alert
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSpec {
    pub name: String,
    pub resource_id: String,
    pub metric: String,
    pub statistic: StatisticKind,
    pub percentile_rank: Option<f64>,
    pub rule: ThresholdRule,
    pub lookback: Duration,
    pub period: Duration,
    pub source_statistic: String,
}

impl MonitorSpec {
    pub fn fetch_request(&self, end: Option<DateTime<Utc>>) -> FetchRequest {
        FetchRequest {
            resource_id: self.resource_id.clone(),
            metric_name: self.metric.clone(),
            lookback: self.lookback,
            period: self.period,
            end,
            source_statistic: Some(self.source_statistic.clone()),
        }
    }
}

/// Reduced statistic and verdict for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub statistic: ReducedStatistic,
    pub verdict: Verdict,
    /// Datapoints in the window; zero means the value is the "no data" default
    pub datapoints: usize,
}

/// Reduce a fetched window and evaluate it against a rule
pub fn evaluate_window(
    window: &MetricWindow,
    kind: StatisticKind,
    percentile_rank: Option<f64>,
    rule: &ThresholdRule,
) -> Result<Evaluation> {
    let statistic = reduce(&window.datapoints, kind, percentile_rank)?;
    let verdict = evaluate(statistic.value, rule);

    Ok(Evaluation {
        statistic,
        verdict,
        datapoints: window.len(),
    })
}

/// Why a monitor could not be evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UpstreamUnavailable,
    InvalidArgument,
    Cancelled,
}

impl From<&WatchError> for FailureKind {
    fn from(err: &WatchError) -> Self {
        match err {
            WatchError::UpstreamUnavailable { .. } => FailureKind::UpstreamUnavailable,
            WatchError::InvalidArgument(_) => FailureKind::InvalidArgument,
            WatchError::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// Outcome of one monitor in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MonitorOutcome {
    Evaluated(Evaluation),
    Failed { kind: FailureKind, error: String },
}

/// Result of one monitor, keyed by its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorResult {
    pub monitor: String,
    pub resource_id: String,
    pub metric: String,
    pub outcome: MonitorOutcome,
}

impl MonitorResult {
    pub fn from_result(spec: &MonitorSpec, result: Result<Evaluation>) -> Self {
        let outcome = match result {
            Ok(evaluation) => MonitorOutcome::Evaluated(evaluation),
            Err(err) => MonitorOutcome::Failed {
                kind: FailureKind::from(&err),
                error: err.to_string(),
            },
        };

        Self {
            monitor: spec.name.clone(),
            resource_id: spec.resource_id.clone(),
            metric: spec.metric.clone(),
            outcome,
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(&self.outcome, MonitorOutcome::Evaluated(e) if e.verdict.triggered)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, MonitorOutcome::Failed { .. })
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        match &self.outcome {
            MonitorOutcome::Evaluated(e) => Some(e),
            MonitorOutcome::Failed { .. } => None,
        }
    }
}

/// Fetch, reduce and evaluate one monitor
pub async fn evaluate_monitor(
    fetcher: &MetricWindowFetcher,
    spec: &MonitorSpec,
    end: Option<DateTime<Utc>>,
    cancel: &CancellationToken,
) -> Result<Evaluation> {
    let window = fetcher.fetch(&spec.fetch_request(end), cancel).await?;
    evaluate_window(&window, spec.statistic, spec.percentile_rank, &spec.rule)
}

//! Batch evaluation of many monitors
//!
//! Monitors are independent: they are evaluated concurrently, bounded by a
//! semaphore, and one monitor's upstream failure never stops the others.
//! A batch-level deadline cancels whatever is still in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::WatchError;
use crate::fetcher::MetricWindowFetcher;
use crate::monitor::{evaluate_monitor, FailureKind, MonitorOutcome, MonitorResult, MonitorSpec};
use crate::observability::{StructuredLogger, WatchMetrics};

/// Configuration for batch fan-out
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum monitors evaluated at the same time
    pub max_concurrency: usize,
    /// Whole-batch deadline; in-flight fetches are cancelled when it expires
    pub deadline: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            deadline: Duration::from_secs(120),
        }
    }
}

/// Results of one pass over all monitors, in configuration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<MonitorResult>,
}

impl BatchReport {
    pub fn triggered(&self) -> impl Iterator<Item = &MonitorResult> {
        self.results.iter().filter(|r| r.is_triggered())
    }

    pub fn failed(&self) -> impl Iterator<Item = &MonitorResult> {
        self.results.iter().filter(|r| r.is_failed())
    }

    pub fn triggered_count(&self) -> usize {
        self.triggered().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn evaluated_count(&self) -> usize {
        self.results.len() - self.failed_count()
    }

    /// True when there were monitors and none of them could be evaluated
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.failed_count() == self.results.len()
    }
}

/// Evaluates a set of monitors against one fetcher
#[derive(Clone)]
pub struct BatchEvaluator {
    fetcher: MetricWindowFetcher,
    config: BatchConfig,
    logger: StructuredLogger,
    metrics: WatchMetrics,
}

impl BatchEvaluator {
    pub fn new(fetcher: MetricWindowFetcher, config: BatchConfig, logger: StructuredLogger) -> Self {
        Self {
            fetcher,
            config,
            logger,
            metrics: WatchMetrics::new(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Evaluate every monitor; never fails as a whole.
    ///
    /// All windows share the same end instant so results are comparable.
    pub async fn run(&self, monitors: &[MonitorSpec], cancel: &CancellationToken) -> BatchReport {
        let started_at = Utc::now();
        let started = Instant::now();

        let batch_cancel = cancel.child_token();
        let deadline_guard = batch_cancel.clone();
        let deadline = self.config.deadline;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    debug!(deadline_secs = deadline.as_secs(), "Batch deadline expired, cancelling");
                    deadline_guard.cancel();
                }
                _ = deadline_guard.cancelled() => {}
            }
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (idx, spec) in monitors.iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let spec = spec.clone();
            let cancel = batch_cancel.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(WatchError::Cancelled),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(_permit) => evaluate_monitor(&fetcher, &spec, Some(started_at), &cancel).await,
                        Err(_) => Err(WatchError::Cancelled),
                    },
                };
                (idx, MonitorResult::from_result(&spec, result))
            });
        }

        let mut slots: Vec<Option<MonitorResult>> = vec![None; monitors.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => error!(error = %e, "Monitor evaluation task aborted"),
            }
        }

        // Stops the deadline timer
        batch_cancel.cancel();

        let results: Vec<MonitorResult> = slots
            .into_iter()
            .zip(monitors)
            .map(|(slot, spec)| {
                slot.unwrap_or_else(|| MonitorResult {
                    monitor: spec.name.clone(),
                    resource_id: spec.resource_id.clone(),
                    metric: spec.metric.clone(),
                    outcome: MonitorOutcome::Failed {
                        kind: FailureKind::Cancelled,
                        error: "evaluation task aborted".to_string(),
                    },
                })
            })
            .collect();

        for result in &results {
            self.record(result);
        }

        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            results,
        };

        let elapsed = started.elapsed();
        self.metrics.observe_batch_duration(elapsed.as_secs_f64());
        self.logger.log_batch_complete(
            report.evaluated_count(),
            report.triggered_count(),
            report.failed_count(),
            elapsed.as_millis(),
        );

        report
    }

    fn record(&self, result: &MonitorResult) {
        match &result.outcome {
            MonitorOutcome::Evaluated(evaluation) => {
                let state = if evaluation.verdict.triggered {
                    "triggered"
                } else {
                    "ok"
                };
                self.metrics.inc_verdict(state);
                self.logger.log_verdict(
                    &result.monitor,
                    &result.resource_id,
                    &result.metric,
                    evaluation.datapoints,
                    evaluation.verdict.triggered,
                    &evaluation.verdict.message,
                );
            }
            MonitorOutcome::Failed { error, .. } => {
                self.metrics.inc_verdict("failed");
                self.logger
                    .log_fetch_failure(&result.monitor, &result.resource_id, &result.metric, error);
            }
        }
    }
}

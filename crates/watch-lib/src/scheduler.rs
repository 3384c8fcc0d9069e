//! Periodic batch evaluation loop for the long-running agent

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::batch::{BatchEvaluator, BatchReport};
use crate::health::{components, ComponentHealth, HealthRegistry};
use crate::monitor::MonitorSpec;
use crate::observability::WatchMetrics;

/// Most recent batch, shared with the HTTP layer
pub type SharedReport = Arc<RwLock<Option<BatchReport>>>;

/// Runs a batch every `interval` until cancelled
pub struct Scheduler {
    evaluator: BatchEvaluator,
    monitors: Vec<MonitorSpec>,
    interval: Duration,
    health: HealthRegistry,
    latest: SharedReport,
}

impl Scheduler {
    pub fn new(
        evaluator: BatchEvaluator,
        monitors: Vec<MonitorSpec>,
        interval: Duration,
        health: HealthRegistry,
    ) -> Self {
        WatchMetrics::new().set_monitors_configured(monitors.len() as i64);

        Self {
            evaluator,
            monitors,
            interval,
            health,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Handle to the latest report; `None` until the first batch completes
    pub fn latest_report(&self) -> SharedReport {
        self.latest.clone()
    }

    /// Evaluate all monitors once and publish the result
    pub async fn tick(&self, cancel: &CancellationToken) -> BatchReport {
        let report = self.evaluator.run(&self.monitors, cancel).await;

        self.health
            .update(components::SOURCE, ComponentHealth::from_report(&report))
            .await;
        self.health.set_ready(true).await;
        *self.latest.write().await = Some(report.clone());

        report
    }

    /// Run until `cancel` fires. The first batch starts immediately.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            monitors = self.monitors.len(),
            interval_secs = self.interval.as_secs(),
            "Evaluation scheduler started"
        );
        self.health.set_healthy(components::SCHEDULER).await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = self.tick(&cancel).await;
            debug!(
                triggered = report.triggered_count(),
                failed = report.failed_count(),
                "Scheduled batch finished"
            );
        }

        self.health
            .set_unhealthy(components::SCHEDULER, "scheduler stopped")
            .await;
        info!("Evaluation scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchConfig;
    use crate::error::SourceError;
    use crate::fetcher::{FetchConfig, MetricWindowFetcher};
    use crate::health::ComponentStatus;
    use crate::models::{Comparator, Datapoint, StatisticKind, ThresholdRule};
    use crate::observability::StructuredLogger;
    use crate::sources::{MetricQuery, MetricsSource};
    use async_trait::async_trait;

    struct DownSource;

    #[async_trait]
    impl MetricsSource for DownSource {
        async fn get_datapoints(
            &self,
            _query: &MetricQuery,
        ) -> std::result::Result<Vec<Datapoint>, SourceError> {
            Err(SourceError::Unreachable("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn scheduler(health: HealthRegistry) -> Scheduler {
        let fetcher = MetricWindowFetcher::new(
            Arc::new(DownSource),
            FetchConfig::default()
                .with_max_retries(0)
                .with_base_delay(Duration::from_millis(1)),
        );
        let evaluator =
            BatchEvaluator::new(fetcher, BatchConfig::default(), StructuredLogger::new("test"));
        let monitors = vec![MonitorSpec {
            name: "web-cpu".to_string(),
            resource_id: "i-web".to_string(),
            metric: "CPUUtilization".to_string(),
            statistic: StatisticKind::Max,
            percentile_rank: None,
            rule: ThresholdRule::new(Comparator::Gt, 80.0),
            lookback: Duration::from_secs(600),
            period: Duration::from_secs(60),
            source_statistic: "Maximum".to_string(),
        }];

        Scheduler::new(evaluator, monitors, Duration::from_secs(3600), health)
    }

    #[tokio::test]
    async fn test_tick_publishes_report_and_health() {
        let health = HealthRegistry::new();
        let scheduler = scheduler(health.clone());
        let latest = scheduler.latest_report();
        assert!(latest.read().await.is_none());

        let report = scheduler.tick(&CancellationToken::new()).await;
        assert!(report.all_failed());

        assert_eq!(latest.read().await.as_ref(), Some(&report));
        let status = health.health().await.components[components::SOURCE].status;
        assert_eq!(status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let health = HealthRegistry::new();
        let scheduler = scheduler(health.clone());
        let latest = scheduler.latest_report();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(scheduler.run(cancel.clone()));
        // First tick fires immediately
        for _ in 0..100 {
            if latest.read().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(latest.read().await.is_some());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let status = health.health().await.components[components::SCHEDULER].status;
        assert_eq!(status, ComponentStatus::Unhealthy);
    }
}

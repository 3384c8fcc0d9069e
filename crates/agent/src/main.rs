//! Metricwatch agent
//!
//! Evaluates the configured monitors every interval and serves health,
//! Prometheus metrics and the latest report over HTTP.

use anyhow::{Context, Result};
use metricwatch_agent::{api, config::AgentConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use watch_lib::{
    health::{components, HealthRegistry},
    sources::create_source,
    BatchEvaluator, MetricWindowFetcher, Scheduler, StructuredLogger, WatchConfig,
};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting metricwatch-agent");

    let config = AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        config_path = %config.config_path.display(),
        interval_secs = config.interval_secs,
        "Agent configured"
    );

    let watch_config = WatchConfig::load(&config.config_path)
        .with_context(|| format!("failed to load {}", config.config_path.display()))?;
    let monitors = watch_config.monitor_specs()?;

    let fetch_config = watch_config.fetch.fetch_config();
    let source = create_source(&watch_config.source, fetch_config.attempt_timeout)?;
    let fetcher = MetricWindowFetcher::new(source, fetch_config);

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SOURCE).await;
    health_registry.register(components::SCHEDULER).await;

    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION, monitors.len());

    let evaluator = BatchEvaluator::new(fetcher, watch_config.fetch.batch_config(), logger.clone());
    let scheduler = Scheduler::new(
        evaluator,
        monitors,
        config.interval(),
        health_registry.clone(),
    );

    let app_state = Arc::new(api::AppState::new(
        health_registry,
        scheduler.latest_report(),
    ));

    let shutdown = CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    let signal_logger = logger.clone();
    let served = api::serve_until(config.api_port, app_state, shutdown.clone(), async move {
        tokio::signal::ctrl_c().await?;
        signal_logger.log_shutdown("SIGINT received");
        Ok(())
    })
    .await;

    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "Scheduler task failed");
    }
    if let Err(e) = served {
        error!(error = %format!("{e:#}"), "Agent stopping on API failure");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

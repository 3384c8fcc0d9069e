//! HTTP API for health checks, Prometheus metrics and the latest report

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use watch_lib::{
    health::{ComponentStatus, HealthRegistry},
    scheduler::SharedReport,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub latest_report: SharedReport,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, latest_report: SharedReport) -> Self {
        Self {
            health_registry,
            latest_report,
        }
    }
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Latest batch report; 404 until the first batch completes
async fn report(State(state): State<Arc<AppState>>) -> Response {
    match state.latest_report.read().await.as_ref() {
        Some(report) => (StatusCode::OK, Json(report)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no evaluation batch has completed yet" })),
        )
            .into_response(),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/report", get(report))
        .with_state(state)
}

/// Start the API server; returns once `shutdown` fires and in-flight requests finish
pub async fn serve(port: u16, state: Arc<AppState>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Serve the API until `signal` resolves or the server stops on its own.
///
/// `shutdown` is cancelled in both cases. A server that exits before the
/// signal (failed bind included) is returned as an error.
pub async fn serve_until<F>(
    port: u16,
    state: Arc<AppState>,
    shutdown: CancellationToken,
    signal: F,
) -> anyhow::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let mut server = tokio::spawn(serve(port, state, shutdown.clone()));

    tokio::select! {
        received = signal => {
            shutdown.cancel();
            received?;
            match server.await {
                Ok(result) => result,
                Err(e) => Err(e.into()),
            }
        }
        finished = &mut server => {
            shutdown.cancel();
            match finished {
                Ok(Ok(())) => anyhow::bail!("API server stopped unexpectedly"),
                Ok(Err(e)) => Err(e.context("API server failed")),
                Err(e) => Err(anyhow::Error::new(e).context("API server task failed")),
            }
        }
    }
}

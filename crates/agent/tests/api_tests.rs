//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use metricwatch_agent::api::{create_router, serve_until, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use watch_lib::{
    health::{components, HealthRegistry},
    monitor::{FailureKind, MonitorOutcome, MonitorResult},
    BatchReport, WatchMetrics,
};

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SOURCE).await;
    health_registry.register(components::SCHEDULER).await;

    let state = Arc::new(AppState::new(
        health_registry,
        Arc::new(RwLock::new(None)),
    ));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["source"].is_object());
    assert!(health["components"]["scheduler"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_degraded(components::SOURCE, "1 of 3 monitors failed")
        .await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["source"]["message"],
        "1 of 3 monitors failed"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_unhealthy(components::SOURCE, "all 3 monitors failed")
        .await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_batch() {
    let (app, _state) = setup_test_app().await;

    let (status, readiness) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app().await;
    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_report_is_404_before_first_batch() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get_json(app, "/report").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_report_returns_latest_batch() {
    let (app, state) = setup_test_app().await;
    *state.latest_report.write().await = Some(BatchReport {
        started_at: Utc::now(),
        finished_at: Utc::now(),
        results: vec![MonitorResult {
            monitor: "db-free-storage".to_string(),
            resource_id: "db-1".to_string(),
            metric: "FreeStorageSpace".to_string(),
            outcome: MonitorOutcome::Failed {
                kind: FailureKind::UpstreamUnavailable,
                error: "connection refused".to_string(),
            },
        }],
    });

    let (status, report) = get_json(app, "/report").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["results"][0]["monitor"], "db-free-storage");
    assert_eq!(report["results"][0]["outcome"]["status"], "failed");
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;

    let metrics = WatchMetrics::new();
    metrics.observe_fetch_latency(0.01);
    metrics.observe_batch_duration(0.2);
    metrics.inc_verdict("triggered");

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("metricwatch_fetch_latency_seconds_bucket"));
    assert!(text.contains("metricwatch_batch_duration_seconds_count"));
    assert!(text.contains("metricwatch_verdicts_total"));
    assert!(text.contains("metricwatch_last_batch_timestamp_seconds"));
}

#[tokio::test]
async fn test_serve_until_fails_fast_when_port_is_taken() {
    let occupied = tokio::net::TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();
    let (_, state) = setup_test_app().await;
    let shutdown = CancellationToken::new();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        serve_until(port, state, shutdown.clone(), std::future::pending()),
    )
    .await
    .expect("serve_until should return without a signal");

    assert!(result.is_err());
    assert!(shutdown.is_cancelled());
}

#[tokio::test]
async fn test_serve_until_stops_cleanly_on_signal() {
    let (_, state) = setup_test_app().await;
    let shutdown = CancellationToken::new();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        serve_until(0, state, shutdown.clone(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }),
    )
    .await
    .expect("serve_until should return after the signal");

    assert!(result.is_ok());
    assert!(shutdown.is_cancelled());
}

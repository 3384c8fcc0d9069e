//! Metric window evaluation library
//!
//! This crate provides the core functionality for:
//! - Fetching time-windowed metric datapoints from a pluggable source
//! - Reducing a window to a single statistic (sum, average, min, max, percentile)
//! - Evaluating the statistic against a threshold rule
//! - Running many monitors concurrently with isolated failures
//! - Health checks and observability for the long-running agent

pub mod batch;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod scheduler;
pub mod sources;
pub mod stats;
pub mod threshold;

pub use batch::{BatchConfig, BatchEvaluator, BatchReport};
pub use config::{MonitorConfig, SourceConfig, WatchConfig};
pub use error::{Result, SourceError, WatchError};
pub use fetcher::{FetchConfig, FetchRequest, MetricWindowFetcher};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use monitor::{evaluate_monitor, Evaluation, MonitorOutcome, MonitorResult, MonitorSpec};
pub use observability::{StructuredLogger, WatchMetrics};
pub use scheduler::{Scheduler, SharedReport};
pub use sources::{create_source, MetricQuery, MetricsSource};
pub use stats::reduce;
pub use threshold::evaluate;

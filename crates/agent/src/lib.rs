//! Metricwatch agent: scheduled monitor evaluation with health, metrics
//! and report endpoints

pub mod api;
pub mod config;

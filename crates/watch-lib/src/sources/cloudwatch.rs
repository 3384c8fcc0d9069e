//! Parsing of CloudWatch `GetMetricStatistics` shaped payloads

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::SourceError;
use crate::models::Datapoint;

/// Top-level response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatisticsResponse {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub datapoints: Vec<RawDatapoint>,
}

/// One datapoint as exported, with every statistic field kept by name
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawDatapoint {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub extended_statistics: HashMap<String, f64>,
    #[serde(flatten)]
    pub statistics: HashMap<String, Value>,
}

impl RawDatapoint {
    /// Read a statistic by name; percentile names (`p99`, `p99.9`) are
    /// looked up in `ExtendedStatistics`
    pub fn statistic(&self, field: &str) -> Option<f64> {
        if let Some(value) = self.statistics.get(field).and_then(Value::as_f64) {
            return Some(value);
        }
        self.extended_statistics.get(field).copied()
    }
}

/// Parse a response body and pick `field` out of every datapoint
pub fn parse_statistics(body: &str, field: &str) -> Result<Vec<Datapoint>, SourceError> {
    let response: StatisticsResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::Malformed(format!("invalid statistics payload: {e}")))?;

    response
        .datapoints
        .iter()
        .map(|raw| {
            raw.statistic(field)
                .map(|value| Datapoint::new(raw.timestamp, value))
                .ok_or_else(|| {
                    SourceError::Malformed(format!(
                        "datapoint at {} has no {field} statistic",
                        raw.timestamp.to_rfc3339()
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Label": "CPUUtilization",
        "Datapoints": [
            {"Timestamp": "2024-01-01T00:05:00Z", "Average": 90.0, "Maximum": 97.5, "Unit": "Percent"},
            {"Timestamp": "2024-01-01T00:00:00+00:00", "Average": 70.0, "Maximum": 75.0, "Unit": "Percent"}
        ]
    }"#;

    #[test]
    fn test_parse_average_field() {
        let points = parse_statistics(SAMPLE, "Average").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 90.0);
        assert_eq!(points[1].value, 70.0);
        assert_eq!(points[1].timestamp.timestamp(), 1704067200);
    }

    #[test]
    fn test_parse_other_field() {
        let points = parse_statistics(SAMPLE, "Maximum").unwrap();
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![97.5, 75.0]);
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = parse_statistics(SAMPLE, "Sum").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn test_empty_datapoints() {
        let points = parse_statistics(r#"{"Label": "NetworkIn", "Datapoints": []}"#, "Sum").unwrap();
        assert!(points.is_empty());

        let points = parse_statistics("{}", "Sum").unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_extended_statistics() {
        let body = r#"{"Datapoints": [
            {"Timestamp": "2024-01-01T00:00:00Z", "ExtendedStatistics": {"p99": 412.0}}
        ]}"#;
        let points = parse_statistics(body, "p99").unwrap();
        assert_eq!(points[0].value, 412.0);
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = parse_statistics("not json", "Average").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}

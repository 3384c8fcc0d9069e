//! Core data models for metric evaluation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WatchError;

/// One sample from a monitoring metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Datapoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Build a datapoint from a unix timestamp in seconds
    pub fn at_secs(secs: i64, value: f64) -> Self {
        let timestamp = DateTime::from_timestamp(secs, 0).unwrap_or_default();
        Self { timestamp, value }
    }
}

/// Datapoints for one (resource, metric) pair over a lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWindow {
    pub resource_id: String,
    pub metric_name: String,
    pub period_seconds: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Sorted by timestamp
    pub datapoints: Vec<Datapoint>,
}

impl MetricWindow {
    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.datapoints.len()
    }
}

/// Summary statistic to reduce a window to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticKind {
    Sum,
    Average,
    Min,
    Max,
    Percentile,
}

impl fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatisticKind::Sum => write!(f, "sum"),
            StatisticKind::Average => write!(f, "average"),
            StatisticKind::Min => write!(f, "min"),
            StatisticKind::Max => write!(f, "max"),
            StatisticKind::Percentile => write!(f, "percentile"),
        }
    }
}

impl FromStr for StatisticKind {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "average" | "avg" | "mean" => Ok(Self::Average),
            "min" | "minimum" => Ok(Self::Min),
            "max" | "maximum" => Ok(Self::Max),
            "percentile" | "pct" | "p" => Ok(Self::Percentile),
            other => Err(WatchError::invalid(format!("unknown statistic: {other}"))),
        }
    }
}

/// A scalar computed from a window of datapoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReducedStatistic {
    pub kind: StatisticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile_rank: Option<f64>,
    pub value: f64,
}

impl fmt::Display for ReducedStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percentile_rank {
            Some(rank) => write!(f, "p{}={:.2}", rank, self.value),
            None => write!(f, "{}={:.2}", self.kind, self.value),
        }
    }
}

/// Comparison operator of a threshold rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
            Comparator::Eq => "==",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparator {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gt" | ">" | "greater_than" => Ok(Self::Gt),
            "lt" | "<" | "less_than" => Ok(Self::Lt),
            "ge" | "gte" | ">=" | "greater_equal" => Ok(Self::Ge),
            "le" | "lte" | "<=" | "less_equal" => Ok(Self::Le),
            "eq" | "==" | "=" | "equal" => Ok(Self::Eq),
            other => Err(WatchError::invalid(format!("unknown comparator: {other}"))),
        }
    }
}

/// Comparator plus threshold used to classify a reduced statistic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub comparator: Comparator,
    pub threshold_value: f64,
}

impl ThresholdRule {
    pub fn new(comparator: Comparator, threshold_value: f64) -> Self {
        Self {
            comparator,
            threshold_value,
        }
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.comparator, self.threshold_value)
    }
}

/// Outcome of comparing an observed value against a threshold rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub triggered: bool,
    pub observed_value: f64,
    pub rule: ThresholdRule,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparator_parsing() {
        assert_eq!("GT".parse::<Comparator>().unwrap(), Comparator::Gt);
        assert_eq!(">=".parse::<Comparator>().unwrap(), Comparator::Ge);
        assert_eq!("lte".parse::<Comparator>().unwrap(), Comparator::Le);
        assert_eq!(" eq ".parse::<Comparator>().unwrap(), Comparator::Eq);

        let err = "approximately".parse::<Comparator>().unwrap_err();
        assert!(matches!(err, WatchError::InvalidArgument(_)));
    }

    #[test]
    fn test_statistic_kind_parsing() {
        assert_eq!("Average".parse::<StatisticKind>().unwrap(), StatisticKind::Average);
        assert_eq!("maximum".parse::<StatisticKind>().unwrap(), StatisticKind::Max);
        assert!("median".parse::<StatisticKind>().is_err());
    }

    #[test]
    fn test_serde_names_are_lowercase() {
        let rule = ThresholdRule::new(Comparator::Ge, 10.0);
        let json = serde_json::to_value(rule).unwrap();
        assert_eq!(json["comparator"], "ge");

        let kind: StatisticKind = serde_json::from_str("\"percentile\"").unwrap();
        assert_eq!(kind, StatisticKind::Percentile);
    }

    #[test]
    fn test_reduced_statistic_display() {
        let stat = ReducedStatistic {
            kind: StatisticKind::Percentile,
            percentile_rank: Some(95.0),
            value: 12.5,
        };
        assert_eq!(stat.to_string(), "p95=12.50");

        let avg = ReducedStatistic {
            kind: StatisticKind::Average,
            percentile_rank: None,
            value: 3.0,
        };
        assert_eq!(avg.to_string(), "average=3.00");
    }
}

//! Statistics reduction over metric windows
//!
//! Reduces a sequence of datapoints to a single scalar. An empty sequence
//! always reduces to `0` so that an idle resource reads as zero activity
//! rather than failing the evaluation.

use std::cmp::Ordering;

use crate::error::{Result, WatchError};
use crate::models::{Datapoint, ReducedStatistic, StatisticKind};

/// Reduce `datapoints` to the requested statistic.
///
/// `percentile_rank` is required for [`StatisticKind::Percentile`] and must
/// lie in `(0, 100]`; it is ignored for every other kind.
pub fn reduce(
    datapoints: &[Datapoint],
    kind: StatisticKind,
    percentile_rank: Option<f64>,
) -> Result<ReducedStatistic> {
    let values: Vec<f64> = datapoints.iter().map(|d| d.value).collect();
    reduce_values(&values, kind, percentile_rank)
}

/// Same as [`reduce`] over bare values.
pub fn reduce_values(
    values: &[f64],
    kind: StatisticKind,
    percentile_rank: Option<f64>,
) -> Result<ReducedStatistic> {
    let (value, percentile_rank) = match kind {
        StatisticKind::Sum => (sum(values), None),
        StatisticKind::Average => (average(values), None),
        StatisticKind::Min => (min(values), None),
        StatisticKind::Max => (max(values), None),
        StatisticKind::Percentile => {
            let rank = percentile_rank.ok_or_else(|| {
                WatchError::invalid("percentile statistic requires a percentile rank")
            })?;
            validate_percentile_rank(rank)?;
            (nearest_rank_percentile(values, rank), Some(rank))
        }
    };

    Ok(ReducedStatistic {
        kind,
        percentile_rank,
        value,
    })
}

/// Check that a percentile rank lies in `(0, 100]`
pub fn validate_percentile_rank(rank: f64) -> Result<()> {
    if rank.is_finite() && rank > 0.0 && rank <= 100.0 {
        Ok(())
    } else {
        Err(WatchError::invalid(format!(
            "percentile rank must be in (0, 100], got {rank}"
        )))
    }
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    sum(values) / values.len() as f64
}

fn min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .unwrap_or(0.0)
}

fn max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .unwrap_or(0.0)
}

/// Nearest-rank percentile: the smallest value such that at least `rank`
/// percent of the samples are less than or equal to it.
fn nearest_rank_percentile(values: &[f64], rank: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n = sorted.len();
    // Multiply before dividing so integral `rank * n` stays exact
    let ordinal = (rank * n as f64 / 100.0).ceil() as usize;
    sorted[ordinal.clamp(1, n) - 1]
}

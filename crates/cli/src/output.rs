//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use watch_lib::{BatchReport, MonitorOutcome, MonitorSpec};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for the verdict table
#[derive(Tabled)]
struct VerdictRow {
    #[tabled(rename = "Monitor")]
    monitor: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Statistic")]
    statistic: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "State")]
    state: String,
}

/// Row for monitors that could not be evaluated
#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Monitor")]
    monitor: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// Row for the configured monitor list
#[derive(Tabled)]
struct MonitorRow {
    #[tabled(rename = "Monitor")]
    monitor: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Statistic")]
    statistic: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Window")]
    window: String,
}

/// Print a batch report: verdicts first, then failures
pub fn print_report(report: &BatchReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let mut verdicts = Vec::new();
    let mut failures = Vec::new();
    for result in &report.results {
        match &result.outcome {
            MonitorOutcome::Evaluated(evaluation) => {
                let statistic = match evaluation.statistic.percentile_rank {
                    Some(rank) => format!("p{rank}"),
                    None => evaluation.statistic.kind.to_string(),
                };
                let state = if evaluation.verdict.triggered {
                    "triggered"
                } else if evaluation.datapoints == 0 {
                    "no data"
                } else {
                    "ok"
                };
                verdicts.push(VerdictRow {
                    monitor: result.monitor.clone(),
                    resource: result.resource_id.clone(),
                    metric: result.metric.clone(),
                    statistic,
                    value: format_value(evaluation.statistic.value),
                    rule: evaluation.verdict.rule.to_string(),
                    state: color_state(state),
                });
            }
            MonitorOutcome::Failed { error, .. } => failures.push(FailureRow {
                monitor: result.monitor.clone(),
                resource: result.resource_id.clone(),
                metric: result.metric.clone(),
                error: error.clone(),
            }),
        }
    }

    if verdicts.is_empty() {
        print_warning("No monitors could be evaluated");
    } else {
        println!("{}", Table::new(verdicts).with(Style::rounded()).to_string());
    }

    if !failures.is_empty() {
        println!("\n{}", "Upstream failures:".red().bold());
        println!("{}", Table::new(failures).with(Style::rounded()).to_string());
    }

    println!(
        "\nEvaluated: {}, triggered: {}, failed: {}",
        report.evaluated_count(),
        report.triggered_count(),
        report.failed_count()
    );
    Ok(())
}

/// Print validated monitors
pub fn print_monitors(monitors: &[MonitorSpec], format: OutputFormat) -> anyhow::Result<()> {
    let rows: Vec<MonitorRow> = monitors
        .iter()
        .map(|m| MonitorRow {
            monitor: m.name.clone(),
            resource: m.resource_id.clone(),
            metric: m.metric.clone(),
            statistic: match m.percentile_rank {
                Some(rank) => format!("p{rank}"),
                None => m.statistic.to_string(),
            },
            rule: m.rule.to_string(),
            window: format!("{}s / {}s", m.lookback.as_secs(), m.period.as_secs()),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let names: Vec<&str> = monitors.iter().map(|m| m.name.as_str()).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "valid": true,
                    "monitors": names,
                }))?
            );
        }
        OutputFormat::Table => {
            println!("{}", Table::new(rows).with(Style::rounded()).to_string());
            print_success(&format!("{} monitors valid", monitors.len()));
        }
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Format a statistic with two decimals, matching verdict messages
pub fn format_value(value: f64) -> String {
    format!("{value:.2}")
}

/// Color a verdict state
pub fn color_state(state: &str) -> String {
    match state {
        "ok" => state.green().to_string(),
        "no data" => state.yellow().to_string(),
        "triggered" | "failed" => state.red().bold().to_string(),
        _ => state.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(82.5), "82.50");
        assert_eq!(format_value(0.0), "0.00");
    }

    #[test]
    fn test_color_state_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(color_state("triggered"), "triggered");
        assert_eq!(color_state("no data"), "no data");
    }
}

//! CLI subcommands

pub mod check;
pub mod reduce;
pub mod run;
pub mod validate;

use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use watch_lib::BatchReport;

/// Exit status when every monitor failed upstream
pub const EXIT_ALL_FAILED: u8 = 1;
/// Exit status when findings were requested to fail the run
pub const EXIT_FINDINGS: u8 = 2;

/// Map a report to the process exit status
pub fn exit_status(report: &BatchReport, exit_on_findings: bool) -> u8 {
    if report.all_failed() {
        EXIT_ALL_FAILED
    } else if exit_on_findings && report.triggered_count() > 0 {
        EXIT_FINDINGS
    } else {
        0
    }
}

pub fn exit_code(report: &BatchReport, exit_on_findings: bool) -> ExitCode {
    ExitCode::from(exit_status(report, exit_on_findings))
}

/// Token cancelled on Ctrl-C so in-flight fetches stop promptly
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight fetches");
            token.cancel();
        }
    });
    cancel
}

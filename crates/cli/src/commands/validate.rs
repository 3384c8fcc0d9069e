//! `mwatch validate`: load the configuration and list monitors

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use watch_lib::WatchConfig;

use crate::output::{print_monitors, OutputFormat};

pub fn validate(config_path: &Path, format: OutputFormat) -> Result<ExitCode> {
    let config = WatchConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let monitors = config
        .monitor_specs()
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    print_monitors(&monitors, format)?;
    Ok(ExitCode::SUCCESS)
}

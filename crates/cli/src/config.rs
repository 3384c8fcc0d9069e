//! Configuration file location for the CLI

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Use the explicit path if given, otherwise `~/.config/metricwatch/monitors.toml`
pub fn resolve_config_path(override_path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path);
    }

    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(default_config_path(home))
}

fn default_config_path(home: PathBuf) -> PathBuf {
    home.join(".config").join("metricwatch").join("monitors.toml")
}

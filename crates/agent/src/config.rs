//! Agent configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent process settings, read from `AGENT_*` environment variables.
///
/// Monitor definitions live in the file at `config_path`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name reported in every log line
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics/report
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Monitor configuration file
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Seconds between evaluation batches
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_config_path() -> PathBuf {
    PathBuf::from("/etc/metricwatch/monitors.toml")
}

fn default_interval() -> u64 {
    300
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            config_path: default_config_path(),
            interval_secs: default_interval(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT").try_parsing(true))
            .build()?;

        let agent: AgentConfig = config.try_deserialize()?;
        if agent.interval_secs == 0 {
            anyhow::bail!("AGENT_INTERVAL_SECS must be positive");
        }
        Ok(agent)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

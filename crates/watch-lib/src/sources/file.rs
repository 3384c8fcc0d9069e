//! Directory-backed metrics source
//!
//! Reads exported statistics from `<root>/<resource_id>/<metric>.json`.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{parse_statistics, MetricQuery, MetricsSource};
use crate::error::SourceError;
use crate::models::Datapoint;

/// Metrics source reading CloudWatch-shaped JSON exports from disk
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the export for a resource/metric pair
    pub fn metric_path(&self, resource_id: &str, metric_name: &str) -> PathBuf {
        self.root
            .join(resource_id)
            .join(format!("{metric_name}.json"))
    }
}

#[async_trait]
impl MetricsSource for FileSource {
    async fn get_datapoints(&self, query: &MetricQuery) -> Result<Vec<Datapoint>, SourceError> {
        // A missing root means the export job never ran, not an idle resource
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(SourceError::Unreachable(format!(
                    "{} is not a directory",
                    self.root.display()
                )))
            }
            Err(e) => {
                return Err(SourceError::Unreachable(format!(
                    "cannot access {}: {e}",
                    self.root.display()
                )))
            }
        }

        let path = self.metric_path(&query.resource_id, &query.metric_name);
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No export for metric, treating as no datapoints");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(SourceError::Unreachable(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let datapoints = parse_statistics(&body, &query.statistic)?;
        Ok(datapoints
            .into_iter()
            .filter(|d| query.contains(&d.timestamp))
            .collect())
    }

    fn name(&self) -> &str {
        "file"
    }
}

//! Error types for metric evaluation
//!
//! Fetch failures are always surfaced as errors so that "the source was
//! down" can never be confused with "the resource produced no datapoints".

/// Errors produced by the fetch → reduce → evaluate pipeline.
///
/// # Examples
///
/// ```rust
/// use watch_lib::error::WatchError;
///
/// let err = WatchError::invalid("percentile rank must be in (0, 100]");
/// assert!(err.to_string().contains("percentile rank"));
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WatchError {
    /// The metrics source could not be reached, timed out or returned
    /// malformed data on every attempt.
    #[error("metrics source unavailable for {resource_id}/{metric} after {attempts} attempt(s): {reason}")]
    UpstreamUnavailable {
        resource_id: String,
        metric: String,
        attempts: u32,
        reason: String,
    },

    /// Malformed configuration or call arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller cancelled the operation before it finished.
    #[error("operation cancelled")]
    Cancelled,
}

impl WatchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        WatchError::InvalidArgument(message.into())
    }

    /// Whether a caller could reasonably try the same operation again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WatchError::UpstreamUnavailable { .. })
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Failure of a single request against a metrics source.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// Network failure, missing backing store or a non-success response.
    #[error("source unreachable: {0}")]
    Unreachable(String),

    /// The source answered but the payload could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<config::ConfigError> for WatchError {
    fn from(err: config::ConfigError) -> Self {
        WatchError::InvalidArgument(format!("configuration: {err}"))
    }
}

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for an [`Executor`](crate::Executor).
///
/// By default nothing is logged. The struct deserializes from any serde format, so it can sit
/// inside an application's own configuration file:
///
/// ```ignore
/// let config: ExecutorConfig = serde_json::from_str(r#"{ "trace_sql": true }"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Append every statement to this file.
    pub log_file: Option<PathBuf>,
    /// Emit every statement as a `tracing` event.
    pub trace_sql: bool,
    /// Statements slower than this are reported to monitors as slow queries.
    pub slow_query_threshold_ms: Option<u64>,
    /// Truncate traced SQL to this many bytes.
    pub max_sql_length: Option<usize>,
}

impl ExecutorConfig {
    /// Create a new configuration with defaults (no logging, no slow-query threshold).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every statement to `path`.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Emit every statement through `tracing`.
    pub fn trace_sql(mut self) -> Self {
        self.trace_sql = true;
        self
    }

    /// Set the slow query threshold.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        let millis = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        self.slow_query_threshold_ms = Some(millis);
        self
    }

    /// Set maximum traced SQL length.
    pub fn with_max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn slow_query_threshold(&self) -> Option<Duration> {
        self.slow_query_threshold_ms.map(Duration::from_millis)
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Base log level (trace/debug/info/warn/error).
    pub level: Option<String>,
    /// Additional comma-separated tracing filters, e.g. "tower_http=warn".
    pub filters: Option<String>,
}

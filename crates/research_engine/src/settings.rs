use std::time::Duration;

pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/api/v1/ws/jobs";
pub const DEFAULT_REPORT_URL: &str = "http://localhost:8000/api/v1/jobs";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// WebSocket endpoint streaming job progress.
    pub ws_url: String,
    /// Synchronous job endpoint returning the final report.
    pub report_url: String,
    pub connect_timeout: Duration,
    /// Upper bound for the synchronous report request. Research jobs are slow.
    pub request_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            report_url: DEFAULT_REPORT_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
        }
    }
}

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the line analytics server, e.g. "http://127.0.0.1:5000"
    pub api_base: String,
    /// Websocket URL of the data-updated push channel
    pub ws_url: String,
    pub sqlite_path: String,
    /// Delay between successive expand-all detail requests
    pub detail_stagger_ms: u64,
    /// Reconnect delay for the push channel
    pub live_reconnect_secs: u64,
    pub request_timeout_secs: u64,
    /// Rows per page in the detail-data table
    pub rows_per_page: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            api_base: std::env::var("API_BASE")
                .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string()),
            ws_url: std::env::var("WS_URL")
                .unwrap_or_else(|_| "ws://127.0.0.1:5000/events".to_string()),
            sqlite_path: std::env::var("SQLITE_PATH")
                .unwrap_or_else(|_| "./lineboard.sqlite".to_string()),
            detail_stagger_ms: std::env::var("DETAIL_STAGGER_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            live_reconnect_secs: std::env::var("LIVE_RECONNECT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            rows_per_page: std::env::var("ROWS_PER_PAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        }
    }

    pub fn detail_stagger(&self) -> Duration {
        Duration::from_millis(self.detail_stagger_ms)
    }
}

use std::time::Duration;

/// Settings for reaching the external media server.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// WebSocket URI of the media server's JSON-RPC endpoint.
    pub uri: String,
    /// Upper bound on every remote call.
    pub call_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            uri: "ws://localhost:8888/kurento".to_owned(),
            call_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(240),
        }
    }
}

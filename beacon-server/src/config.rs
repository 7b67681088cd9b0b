use crate::media::MediaConfig;
use std::net::SocketAddr;

/// Runtime configuration of the signaling server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Route that upgrades to the signaling WebSocket.
    pub ws_path: String,
    pub media: MediaConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ws_path: "/one2many".to_owned(),
            media: MediaConfig::default(),
        }
    }
}

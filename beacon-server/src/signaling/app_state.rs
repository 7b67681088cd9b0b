use crate::config::ServerConfig;
use crate::media::{KurentoConnector, MediaBroker, MediaConnector};
use crate::negotiation::Negotiator;
use crate::signaling::{SignalingService, ws_handler};
use axum::Router;
use axum::routing::get;
use std::sync::Arc;

/// Shared state handed to every signaling socket.
pub struct AppState {
    pub signaling: SignalingService,
    pub negotiator: Negotiator,
}

impl AppState {
    pub fn new(connector: Arc<dyn MediaConnector>, config: &ServerConfig) -> Self {
        let signaling = SignalingService::new();
        let broker = MediaBroker::new(connector, &config.media);
        let negotiator = Negotiator::new(broker, Arc::new(signaling.clone()));

        Self {
            signaling,
            negotiator,
        }
    }

    /// State backed by the Kurento media server named in `config`.
    pub fn with_kurento(config: &ServerConfig) -> Self {
        Self::new(Arc::new(KurentoConnector::new(&config.media)), config)
    }
}

pub fn router(state: Arc<AppState>, ws_path: &str) -> Router {
    Router::new()
        .route(ws_path, get(ws_handler))
        .with_state(state)
}

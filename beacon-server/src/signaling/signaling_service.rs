use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use beacon_core::{IceCandidate, ServerMessage, SessionId, SessionIdGenerator, SessionRole};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

struct SignalingInner {
    sessions: DashMap<SessionId, mpsc::UnboundedSender<Message>>,
    ids: SessionIdGenerator,
}

/// Tracks the outbound channel of every open signaling socket.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                sessions: DashMap::new(),
                ids: SessionIdGenerator::new(),
            }),
        }
    }

    /// Registers a new connection and returns its session id.
    pub fn add_session(&self, tx: mpsc::UnboundedSender<Message>) -> SessionId {
        let session = self.inner.ids.next_id();
        self.inner.sessions.insert(session, tx);
        session
    }

    pub fn remove_session(&self, session: &SessionId) {
        self.inner.sessions.remove(session);
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn send_signal(&self, session: SessionId, msg: &ServerMessage) {
        let Some(peer) = self.inner.sessions.get(&session) else {
            warn!("Attempted to send signal to disconnected session {}", session);
            return;
        };

        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = peer.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to session {}: {:?}", session, e);
                }
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_answer(&self, session: SessionId, role: SessionRole, sdp_answer: String) {
        self.send_signal(session, &ServerMessage::accepted(role, sdp_answer));
    }

    async fn send_rejection(&self, session: SessionId, role: SessionRole, message: String) {
        self.send_signal(session, &ServerMessage::rejected(role, message));
    }

    async fn send_ice(&self, session: SessionId, candidate: IceCandidate) {
        self.send_signal(session, &ServerMessage::IceCandidate { candidate });
    }

    async fn send_stop_communication(&self, session: SessionId) {
        self.send_signal(session, &ServerMessage::StopCommunication);
    }

    async fn send_error(&self, session: SessionId, message: String) {
        self.send_signal(session, &ServerMessage::Error { message });
    }
}

use async_trait::async_trait;
use beacon_core::{IceCandidate, SessionId, SessionRole};

/// Outbound half of the signaling channel, used by the negotiator to reach
/// clients without knowing about sockets.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Accepted `presenterResponse` / `viewerResponse` carrying the SDP answer.
    async fn send_answer(&self, session: SessionId, role: SessionRole, sdp_answer: String);

    /// Rejected `presenterResponse` / `viewerResponse`.
    async fn send_rejection(&self, session: SessionId, role: SessionRole, message: String);

    /// Local candidate discovered by the session's media endpoint.
    async fn send_ice(&self, session: SessionId, candidate: IceCandidate);

    /// The presenter this viewer was watching has gone away.
    async fn send_stop_communication(&self, session: SessionId);

    async fn send_error(&self, session: SessionId, message: String);
}

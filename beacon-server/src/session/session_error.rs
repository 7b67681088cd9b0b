use crate::media::MediaError;
use beacon_core::SessionId;
use thiserror::Error;

/// Reasons a join request is rejected. The `Display` text is what the
/// client receives in the `message` field of a rejected response.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Another user is currently acting as presenter. Try again later ...")]
    PresenterBusy,

    #[error("No active presenter. Try again later...")]
    NoActivePresenter,

    #[error("Could not find media server at address {address}: {source}")]
    MediaServerUnreachable {
        address: String,
        #[source]
        source: MediaError,
    },

    #[error("Failed to create media pipeline: {0}")]
    PipelineCreationFailed(#[source] MediaError),

    #[error("Failed to create WebRTC endpoint: {0}")]
    EndpointCreationFailed(#[source] MediaError),

    #[error("SDP negotiation failed: {0}")]
    NegotiationFailed(#[source] MediaError),

    #[error("Failed to connect presenter to viewer: {0}")]
    ConnectFailed(#[source] MediaError),

    #[error("Invalid message {0}")]
    MalformedRequest(String),

    /// Logged by the candidate forwarder, never sent to a client.
    #[error("Failed to route ICE candidate for session {session}: {source}")]
    InternalCandidateRoutingFailure {
        session: SessionId,
        #[source]
        source: MediaError,
    },
}

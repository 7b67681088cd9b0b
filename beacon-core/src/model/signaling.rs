use crate::model::ice::IceCandidate;
use serde::{Deserialize, Serialize};

/// Role requested by a join message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    Presenter,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Accepted,
    Rejected,
}

/// Frames sent by browsers over the signaling socket. The `id` field selects the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Presenter { sdp_offer: String },
    Viewer { sdp_offer: String },
    Stop,
    OnIceCandidate { candidate: IceCandidate },
}

/// Frames pushed by the server to a connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    PresenterResponse {
        response: ResponseStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sdp_answer: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ViewerResponse {
        response: ResponseStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sdp_answer: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    IceCandidate {
        candidate: IceCandidate,
    },
    StopCommunication,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn accepted(role: SessionRole, sdp_answer: String) -> Self {
        let (response, sdp_answer, message) = (ResponseStatus::Accepted, Some(sdp_answer), None);
        match role {
            SessionRole::Presenter => Self::PresenterResponse {
                response,
                sdp_answer,
                message,
            },
            SessionRole::Viewer => Self::ViewerResponse {
                response,
                sdp_answer,
                message,
            },
        }
    }

    pub fn rejected(role: SessionRole, message: impl Into<String>) -> Self {
        let (response, sdp_answer, message) = (ResponseStatus::Rejected, None, Some(message.into()));
        match role {
            SessionRole::Presenter => Self::PresenterResponse {
                response,
                sdp_answer,
                message,
            },
            SessionRole::Viewer => Self::ViewerResponse {
                response,
                sdp_answer,
                message,
            },
        }
    }
}

use crate::session::SessionError;
use crate::signaling::{AppState, SignalingOutput};
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::response::IntoResponse;
use beacon_core::{ClientMessage, SessionId};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let session = state.signaling.add_session(tx);
    info!("Connection received with session {}", session);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();

        async move {
            while let Some(frame) = receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => dispatch(&state, session, &text).await,
                    Ok(Message::Close(_)) => {
                        info!("Connection {} closed", session);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Connection {} error: {}", session, e);
                        break;
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.negotiator.stop(session).await;
    state.signaling.remove_session(&session);
    info!("Session {} disconnected", session);
}

async fn dispatch(state: &AppState, session: SessionId, text: &str) {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Invalid message from session {}: {}", session, e);
            let err = SessionError::MalformedRequest(text.to_owned());
            state.signaling.send_error(session, err.to_string()).await;
            return;
        }
    };

    debug!("Session {} sent {:?}", session, msg);
    match msg {
        ClientMessage::Presenter { sdp_offer } => {
            state.negotiator.presenter(session, sdp_offer).await
        }
        ClientMessage::Viewer { sdp_offer } => state.negotiator.viewer(session, sdp_offer).await,
        ClientMessage::Stop => state.negotiator.stop(session).await,
        ClientMessage::OnIceCandidate { candidate } => {
            state.negotiator.on_ice_candidate(session, candidate).await
        }
    }
}

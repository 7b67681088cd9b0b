use crate::negotiation::Negotiator;
use crate::session::{NegotiationTicket, PresenterSession, ViewerSession};
use beacon_core::SessionId;
use tracing::{debug, info};

enum Teardown {
    Nothing,
    Presenter {
        presenter: PresenterSession,
        viewers: Vec<ViewerSession>,
    },
    Viewer(ViewerSession),
}

impl Negotiator {
    /// Tears down whatever `session` owns.
    ///
    /// Stopping the presenter notifies and drops every viewer and releases
    /// the pipeline; stopping a viewer releases only its endpoint. When the
    /// registry ends up empty the media client is closed. Unknown sessions
    /// are a no-op.
    pub async fn stop(&self, session: SessionId) {
        self.teardown(session, None).await;
    }

    /// Stops `session` on behalf of a failed negotiation, unless its registry
    /// record has meanwhile been taken over by a newer negotiation.
    pub(crate) async fn abort(&self, session: SessionId, ticket: NegotiationTicket) {
        self.teardown(session, Some(ticket)).await;
    }

    /// Stops the presenter, if any, and closes the media client.
    pub async fn shutdown(&self) {
        if let Some(presenter) = self.presenter_session().await {
            self.stop(presenter).await;
        }
        if let Some(client) = self.inner.broker.take_client().await {
            client.close().await;
        }
    }

    async fn teardown(&self, session: SessionId, expected: Option<NegotiationTicket>) {
        let (teardown, client) = {
            let mut state = self.inner.state.lock().await;

            if let (Some(expected), Some(current)) = (expected, state.registry.ticket_of(session)) {
                if expected != current {
                    debug!(
                        "Session {} was renegotiated, skipping teardown of stale attempt",
                        session
                    );
                    return;
                }
            }

            let teardown = if state.registry.is_presenter(session) {
                state
                    .registry
                    .remove_presenter()
                    .map_or(Teardown::Nothing, |(presenter, viewers)| {
                        Teardown::Presenter { presenter, viewers }
                    })
            } else if let Some(viewer) = state.registry.remove_viewer(session) {
                Teardown::Viewer(viewer)
            } else if state.registry.cancel_viewer(session).is_some() {
                debug!("Viewer {} stopped before its endpoint was created", session);
                Teardown::Nothing
            } else {
                Teardown::Nothing
            };

            state.candidates.clear(session);

            let client = if state.registry.is_empty() {
                self.inner.broker.take_client().await
            } else {
                None
            };
            (teardown, client)
        };

        let broker = &self.inner.broker;
        match teardown {
            Teardown::Presenter { presenter, viewers } => {
                info!(
                    "Presenter {} stopped, ending broadcast for {} viewers",
                    presenter.id,
                    viewers.len()
                );
                for viewer in &viewers {
                    self.inner.signaling.send_stop_communication(viewer.id).await;
                }
                if let Some(pipeline) = &presenter.pipeline {
                    broker.release_pipeline(pipeline).await;
                }
            }
            Teardown::Viewer(viewer) => {
                info!("Viewer {} stopped", viewer.id);
                broker.release_endpoint(&viewer.endpoint).await;
            }
            Teardown::Nothing => {}
        }

        if let Some(client) = client {
            info!("No sessions left, closing media server client");
            client.close().await;
        }
    }
}

use crate::media::{CandidateSink, Endpoint, MediaBroker, MediaError, Pipeline};
use crate::session::{
    CandidateQueue, NegotiationTicket, SessionError, SessionPhase, SessionRegistry,
};
use crate::signaling::SignalingOutput;
use beacon_core::{IceCandidate, SessionId, SessionRole};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Registry and candidate queue share one lock so that a candidate can
/// never observe an endpoint without also seeing whether it was drained.
#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) registry: SessionRegistry,
    pub(crate) candidates: CandidateQueue,
}

pub(crate) struct NegotiatorInner {
    pub(crate) state: Mutex<SessionState>,
    pub(crate) broker: MediaBroker,
    pub(crate) signaling: Arc<dyn SignalingOutput>,
}

/// Drives presenter and viewer negotiations against the media server.
///
/// Every step that awaits the media server is followed by a check that the
/// negotiation still owns its registry slot; a concurrent `stop` is only
/// observed at those points.
#[derive(Clone)]
pub struct Negotiator {
    pub(crate) inner: Arc<NegotiatorInner>,
}

/// What a viewer needs from the presenter it is about to join.
struct ViewerClaim {
    ticket: NegotiationTicket,
    presenter: NegotiationTicket,
    pipeline: Pipeline,
}

impl Negotiator {
    pub fn new(broker: MediaBroker, signaling: Arc<dyn SignalingOutput>) -> Self {
        Self {
            inner: Arc::new(NegotiatorInner {
                state: Mutex::new(SessionState::default()),
                broker,
                signaling,
            }),
        }
    }

    /// Handles a `presenter` request and replies with `presenterResponse`.
    ///
    /// The slot is claimed before this returns; the media server round trips
    /// continue in a background task.
    pub async fn presenter(&self, session: SessionId, sdp_offer: String) {
        match self.claim_presenter(session, &sdp_offer).await {
            Ok(ticket) => {
                let this = self.clone();
                tokio::spawn(async move {
                    let result = this.negotiate_presenter(session, ticket, &sdp_offer).await;
                    this.respond(session, SessionRole::Presenter, result).await;
                });
            }
            Err(e) => self.respond(session, SessionRole::Presenter, Err(e)).await,
        }
    }

    /// Handles a `viewer` request and replies with `viewerResponse`.
    pub async fn viewer(&self, session: SessionId, sdp_offer: String) {
        match self.claim_viewer(session, &sdp_offer).await {
            Ok(claim) => {
                let this = self.clone();
                tokio::spawn(async move {
                    match this.negotiate_viewer(session, claim, &sdp_offer).await {
                        Ok((ticket, answer, endpoint)) => {
                            this.respond(session, SessionRole::Viewer, Ok(answer)).await;
                            if let Err(e) = this.gather_viewer(session, ticket, &endpoint).await {
                                this.respond(session, SessionRole::Viewer, Err(e)).await;
                            }
                        }
                        Err(e) => this.respond(session, SessionRole::Viewer, Err(e)).await,
                    }
                });
            }
            Err(e) => self.respond(session, SessionRole::Viewer, Err(e)).await,
        }
    }

    /// Runs the whole presenter protocol and returns the SDP answer.
    pub async fn start_presenter(
        &self,
        session: SessionId,
        sdp_offer: &str,
    ) -> Result<String, SessionError> {
        let ticket = self.claim_presenter(session, sdp_offer).await?;
        self.negotiate_presenter(session, ticket, sdp_offer).await
    }

    /// Runs the whole viewer protocol, including candidate gathering, and
    /// returns the SDP answer.
    pub async fn start_viewer(
        &self,
        session: SessionId,
        sdp_offer: &str,
    ) -> Result<String, SessionError> {
        let claim = self.claim_viewer(session, sdp_offer).await?;
        let (ticket, answer, endpoint) = self.negotiate_viewer(session, claim, sdp_offer).await?;
        self.gather_viewer(session, ticket, &endpoint).await?;
        Ok(answer)
    }

    /// Routes a remote candidate to the session's endpoint, or queues it
    /// until the endpoint exists.
    pub async fn on_ice_candidate(&self, session: SessionId, candidate: IceCandidate) {
        let mut state = self.inner.state.lock().await;

        if let Some(sink) = state.registry.candidate_sink(session) {
            debug!("Forwarding candidate from session {}", session);
            if sink.push(candidate) {
                return;
            }
            warn!("Candidate forwarder for session {} is gone, dropping candidate", session);
            return;
        }

        debug!("Queueing candidate from session {}", session);
        state.candidates.enqueue(session, candidate);
    }

    pub async fn phase(&self, session: SessionId) -> SessionPhase {
        self.inner.state.lock().await.registry.phase_of(session)
    }

    pub async fn presenter_session(&self) -> Option<SessionId> {
        self.inner.state.lock().await.registry.presenter().map(|p| p.id)
    }

    pub async fn viewer_count(&self) -> usize {
        self.inner.state.lock().await.registry.viewer_count()
    }

    pub async fn viewers(&self) -> Vec<SessionId> {
        self.inner.state.lock().await.registry.viewer_ids()
    }

    pub async fn queued_candidates(&self, session: SessionId) -> usize {
        self.inner.state.lock().await.candidates.len(session)
    }

    /// Steps before the first media server call: drop stale candidates and
    /// claim the presenter slot.
    async fn claim_presenter(
        &self,
        session: SessionId,
        sdp_offer: &str,
    ) -> Result<NegotiationTicket, SessionError> {
        let claimed = {
            let mut state = self.inner.state.lock().await;
            state.candidates.clear(session);
            state.registry.register_presenter(session)
        };

        let ticket = match claimed {
            Ok(ticket) => ticket,
            Err(e) => {
                info!("Rejecting presenter {}: slot is taken", session);
                self.stop(session).await;
                return Err(e);
            }
        };

        if let Err(e) = validate_offer(sdp_offer) {
            self.abort(session, ticket).await;
            return Err(e);
        }

        info!("Session {} claimed the presenter slot", session);
        Ok(ticket)
    }

    async fn negotiate_presenter(
        &self,
        session: SessionId,
        ticket: NegotiationTicket,
        sdp_offer: &str,
    ) -> Result<String, SessionError> {
        let result = self.run_presenter(session, ticket, sdp_offer).await;
        if result.is_err() {
            self.abort(session, ticket).await;
        }
        result
    }

    async fn run_presenter(
        &self,
        session: SessionId,
        ticket: NegotiationTicket,
        sdp_offer: &str,
    ) -> Result<String, SessionError> {
        let broker = &self.inner.broker;

        let client = broker.acquire_client().await?;
        self.ensure_presenter(ticket).await?;

        let pipeline = broker.create_pipeline(&client).await?;
        let attached = {
            let mut state = self.inner.state.lock().await;
            match state.registry.current_presenter_mut(ticket) {
                Some(presenter) => {
                    presenter.pipeline = Some(pipeline.clone());
                    true
                }
                None => false,
            }
        };
        if !attached {
            broker.release_pipeline(&pipeline).await;
            return Err(SessionError::NoActivePresenter);
        }

        let endpoint = broker.create_endpoint(&pipeline).await?;
        let attached = {
            let mut state = self.inner.state.lock().await;
            let SessionState {
                registry,
                candidates,
            } = &mut *state;

            match registry.current_presenter_mut(ticket) {
                Some(presenter) => {
                    let sink = CandidateSink::spawn(broker.clone(), session, endpoint.clone());
                    let queued = candidates.drain(session);
                    debug!(
                        "Draining {} queued candidates into presenter {}",
                        queued.len(),
                        session
                    );
                    for candidate in queued {
                        sink.push(candidate);
                    }
                    presenter.endpoint = Some(endpoint.clone());
                    presenter.candidates = Some(sink);
                    true
                }
                None => false,
            }
        };
        if !attached {
            broker.release_endpoint(&endpoint).await;
            return Err(SessionError::NoActivePresenter);
        }

        let events = broker.subscribe_ice_candidates(&endpoint).await?;
        self.relay_local_candidates(session, events);

        let (answer, gathered) = tokio::join!(
            broker.process_offer(&endpoint, sdp_offer),
            broker.gather_candidates(&endpoint),
        );
        let answer = answer?;
        gathered?;

        let mut state = self.inner.state.lock().await;
        if !state.registry.mark_active(session, ticket) {
            return Err(SessionError::NoActivePresenter);
        }
        info!("Presenter {} is active", session);
        Ok(answer)
    }

    /// Steps before the first media server call: drop stale candidates,
    /// invalidate a previous viewer negotiation on this session, and reserve
    /// a viewer slot under the presenter's pipeline.
    async fn claim_viewer(
        &self,
        session: SessionId,
        sdp_offer: &str,
    ) -> Result<ViewerClaim, SessionError> {
        let stale = {
            let mut state = self.inner.state.lock().await;
            state.candidates.clear(session);

            if state.registry.is_presenter(session) {
                return Err(SessionError::MalformedRequest(format!(
                    "viewer request from presenter session {}",
                    session
                )));
            }

            state.registry.ticket_of(session).is_some()
        };

        if stale {
            info!("Session {} renegotiates as viewer, dropping previous endpoint", session);
            self.stop(session).await;
        }

        let claim = {
            let mut state = self.inner.state.lock().await;
            let presenter = state
                .registry
                .presenter()
                .and_then(|p| p.pipeline.clone().map(|pipeline| (p.ticket, pipeline)));

            match presenter {
                Some((presenter, pipeline)) => state
                    .registry
                    .reserve_viewer(session, presenter)
                    .ok()
                    .map(|ticket| ViewerClaim {
                        ticket,
                        presenter,
                        pipeline,
                    }),
                None => None,
            }
        };

        let Some(claim) = claim else {
            self.stop(session).await;
            return Err(SessionError::NoActivePresenter);
        };

        if let Err(e) = validate_offer(sdp_offer) {
            self.abort(session, claim.ticket).await;
            return Err(e);
        }

        Ok(claim)
    }

    async fn negotiate_viewer(
        &self,
        session: SessionId,
        claim: ViewerClaim,
        sdp_offer: &str,
    ) -> Result<(NegotiationTicket, String, Endpoint), SessionError> {
        let broker = &self.inner.broker;
        let ticket = claim.ticket;

        let endpoint = match broker.create_endpoint(&claim.pipeline).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.abort(session, ticket).await;
                return Err(e);
            }
        };

        // The reservation is gone if the viewer stopped or the presenter
        // left while the endpoint was being created.
        let registered = {
            let mut state = self.inner.state.lock().await;
            let sink = CandidateSink::spawn(broker.clone(), session, endpoint.clone());
            let registered =
                state
                    .registry
                    .register_viewer(session, ticket, endpoint.clone(), sink.clone());
            if registered.is_ok() {
                let queued = state.candidates.drain(session);
                debug!(
                    "Draining {} queued candidates into viewer {}",
                    queued.len(),
                    session
                );
                for candidate in queued {
                    sink.push(candidate);
                }
            }
            registered
        };

        if let Err(e) = registered {
            info!("Viewer {} was cancelled during negotiation, releasing endpoint", session);
            broker.release_endpoint(&endpoint).await;
            self.abort(session, ticket).await;
            return Err(e);
        }

        let result = self
            .run_viewer(session, ticket, claim.presenter, &endpoint, sdp_offer)
            .await;
        match result {
            Ok(answer) => Ok((ticket, answer, endpoint)),
            Err(e) => {
                self.abort(session, ticket).await;
                Err(e)
            }
        }
    }

    async fn run_viewer(
        &self,
        session: SessionId,
        ticket: NegotiationTicket,
        presenter: NegotiationTicket,
        endpoint: &Endpoint,
        sdp_offer: &str,
    ) -> Result<String, SessionError> {
        let broker = &self.inner.broker;

        let events = broker.subscribe_ice_candidates(endpoint).await?;
        self.relay_local_candidates(session, events);

        let answer = broker.process_offer(endpoint, sdp_offer).await?;

        let source = {
            let state = self.inner.state.lock().await;
            state
                .registry
                .current_presenter(presenter)
                .and_then(|p| p.endpoint.clone())
                .ok_or(SessionError::NoActivePresenter)?
        };

        broker.connect(&source, endpoint).await?;

        let mut state = self.inner.state.lock().await;
        if state.registry.current_presenter(presenter).is_none()
            || !state.registry.mark_active(session, ticket)
        {
            return Err(SessionError::NoActivePresenter);
        }
        info!("Viewer {} is active", session);
        Ok(answer)
    }

    async fn gather_viewer(
        &self,
        session: SessionId,
        ticket: NegotiationTicket,
        endpoint: &Endpoint,
    ) -> Result<(), SessionError> {
        if let Err(e) = self.inner.broker.gather_candidates(endpoint).await {
            error!("Candidate gathering failed for viewer {}: {}", session, e);
            self.abort(session, ticket).await;
            return Err(e);
        }
        Ok(())
    }

    async fn ensure_presenter(&self, ticket: NegotiationTicket) -> Result<(), SessionError> {
        let state = self.inner.state.lock().await;
        state
            .registry
            .current_presenter(ticket)
            .map(|_| ())
            .ok_or(SessionError::NoActivePresenter)
    }

    /// Pushes candidates discovered by the media server to the client.
    fn relay_local_candidates(
        &self,
        session: SessionId,
        mut events: mpsc::UnboundedReceiver<IceCandidate>,
    ) {
        let signaling = self.inner.signaling.clone();
        tokio::spawn(async move {
            while let Some(candidate) = events.recv().await {
                signaling.send_ice(session, candidate).await;
            }
            debug!("Local candidate stream for session {} ended", session);
        });
    }

    async fn respond(
        &self,
        session: SessionId,
        role: SessionRole,
        result: Result<String, SessionError>,
    ) {
        let signaling = &self.inner.signaling;
        match result {
            Ok(answer) => signaling.send_answer(session, role, answer).await,
            Err(e) => {
                error!("{:?} negotiation for session {} failed: {}", role, session, e);
                signaling.send_rejection(session, role, e.to_string()).await;
            }
        }
    }
}

/// Rejects offers that do not parse as SDP before any media object is created.
fn validate_offer(sdp_offer: &str) -> Result<(), SessionError> {
    RTCSessionDescription::offer(sdp_offer.to_owned())
        .map(|_| ())
        .map_err(|e| SessionError::NegotiationFailed(MediaError::InvalidOffer(e.to_string())))
}

use crate::media::{Endpoint, MediaBroker};
use crate::session::SessionError;
use beacon_core::{IceCandidate, SessionId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Ordered inbox of remote candidates for one endpoint.
///
/// A single task forwards candidates to the media server in the order they
/// were pushed. The task ends once every clone of the sink is dropped.
#[derive(Clone)]
pub struct CandidateSink {
    tx: mpsc::UnboundedSender<IceCandidate>,
}

impl CandidateSink {
    pub fn spawn(broker: MediaBroker, session: SessionId, endpoint: Endpoint) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<IceCandidate>();

        tokio::spawn(async move {
            while let Some(candidate) = rx.recv().await {
                let Err(source) = broker.add_ice_candidate(&endpoint, &candidate).await else {
                    continue;
                };
                let err = SessionError::InternalCandidateRoutingFailure { session, source };
                warn!("{}", err);
            }
            debug!("Candidate forwarder for session {} finished", session);
        });

        Self { tx }
    }

    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<IceCandidate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns `false` if the forwarder has already stopped.
    pub fn push(&self, candidate: IceCandidate) -> bool {
        self.tx.send(candidate).is_ok()
    }
}

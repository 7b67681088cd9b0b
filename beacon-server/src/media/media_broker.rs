use crate::media::{
    Endpoint, MediaClient, MediaConfig, MediaConnector, MediaError, MediaObjectId, Pipeline,
};
use crate::session::SessionError;
use beacon_core::IceCandidate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

struct BrokerInner {
    connector: Arc<dyn MediaConnector>,
    client: Mutex<Option<Arc<dyn MediaClient>>>,
    call_timeout: Duration,
}

/// Facade over the external media server.
///
/// Owns the process-wide client, which is created on first use and closed
/// by [`MediaBroker::take_client`] once no session needs it. Every remote
/// call is bounded by the configured timeout and mapped onto a
/// [`SessionError`].
#[derive(Clone)]
pub struct MediaBroker {
    inner: Arc<BrokerInner>,
}

impl MediaBroker {
    pub fn new(connector: Arc<dyn MediaConnector>, config: &MediaConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                connector,
                client: Mutex::new(None),
                call_timeout: config.call_timeout,
            }),
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, MediaError>
    where
        F: Future<Output = Result<T, MediaError>>,
    {
        let after = self.inner.call_timeout;
        tokio::time::timeout(after, call)
            .await
            .map_err(|_| MediaError::Timeout { operation, after })?
    }

    /// Returns the shared client, connecting first if there is none.
    pub async fn acquire_client(&self) -> Result<Arc<dyn MediaClient>, SessionError> {
        if let Some(client) = self.inner.client.lock().await.as_ref() {
            return Ok(client.clone());
        }

        let address = self.inner.connector.address().to_owned();
        let connected = self
            .bounded("connect", self.inner.connector.connect())
            .await
            .map_err(|source| {
                warn!("Could not find media server at address {}: {}", address, source);
                SessionError::MediaServerUnreachable {
                    address: address.clone(),
                    source,
                }
            })?;

        let mut slot = self.inner.client.lock().await;
        if let Some(existing) = slot.as_ref() {
            let existing = existing.clone();
            drop(slot);
            connected.close().await;
            return Ok(existing);
        }

        info!("Connected to media server at {}", address);
        *slot = Some(connected.clone());
        Ok(connected)
    }

    /// Detaches the shared client so the next [`acquire_client`](Self::acquire_client)
    /// connects afresh. The caller is responsible for closing it.
    pub async fn take_client(&self) -> Option<Arc<dyn MediaClient>> {
        self.inner.client.lock().await.take()
    }

    pub async fn create_pipeline(
        &self,
        client: &Arc<dyn MediaClient>,
    ) -> Result<Pipeline, SessionError> {
        let id = self
            .bounded("create MediaPipeline", client.create_pipeline())
            .await
            .map_err(SessionError::PipelineCreationFailed)?;

        Ok(Pipeline {
            id,
            client: client.clone(),
        })
    }

    pub async fn create_endpoint(&self, pipeline: &Pipeline) -> Result<Endpoint, SessionError> {
        let id = self
            .bounded(
                "create WebRtcEndpoint",
                pipeline.client.create_endpoint(&pipeline.id),
            )
            .await
            .map_err(SessionError::EndpointCreationFailed)?;

        Ok(Endpoint {
            id,
            client: pipeline.client.clone(),
        })
    }

    pub async fn process_offer(
        &self,
        endpoint: &Endpoint,
        sdp_offer: &str,
    ) -> Result<String, SessionError> {
        self.bounded(
            "processOffer",
            endpoint.client.process_offer(&endpoint.id, sdp_offer),
        )
        .await
        .map_err(SessionError::NegotiationFailed)
    }

    pub async fn gather_candidates(&self, endpoint: &Endpoint) -> Result<(), SessionError> {
        self.bounded(
            "gatherCandidates",
            endpoint.client.gather_candidates(&endpoint.id),
        )
        .await
        .map_err(SessionError::NegotiationFailed)
    }

    pub async fn subscribe_ice_candidates(
        &self,
        endpoint: &Endpoint,
    ) -> Result<mpsc::UnboundedReceiver<IceCandidate>, SessionError> {
        self.bounded(
            "subscribe IceCandidateFound",
            endpoint.client.subscribe_ice_candidates(&endpoint.id),
        )
        .await
        .map_err(SessionError::NegotiationFailed)
    }

    /// Routes media out of `source` into `sink`.
    pub async fn connect(&self, source: &Endpoint, sink: &Endpoint) -> Result<(), SessionError> {
        self.bounded("connect", source.client.connect(&source.id, &sink.id))
            .await
            .map_err(SessionError::ConnectFailed)
    }

    /// Errors are left to the caller, which only logs them.
    pub async fn add_ice_candidate(
        &self,
        endpoint: &Endpoint,
        candidate: &IceCandidate,
    ) -> Result<(), MediaError> {
        self.bounded(
            "addIceCandidate",
            endpoint.client.add_ice_candidate(&endpoint.id, candidate),
        )
        .await
    }

    pub async fn release_pipeline(&self, pipeline: &Pipeline) {
        self.release(&pipeline.client, &pipeline.id).await;
    }

    pub async fn release_endpoint(&self, endpoint: &Endpoint) {
        self.release(&endpoint.client, &endpoint.id).await;
    }

    async fn release(&self, client: &Arc<dyn MediaClient>, object: &MediaObjectId) {
        if let Err(e) = self.bounded("release", client.release(object)).await {
            warn!("Failed to release media object {}: {}", object, e);
        }
    }
}

use crate::media::MediaError;
use async_trait::async_trait;
use beacon_core::IceCandidate;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Id of a pipeline or endpoint living on the media server.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct MediaObjectId(pub String);

impl From<&str> for MediaObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for MediaObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for MediaObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opens connections to a media server.
#[async_trait]
pub trait MediaConnector: Send + Sync {
    /// Address reported in `MediaServerUnreachable` errors.
    fn address(&self) -> &str;

    async fn connect(&self) -> Result<Arc<dyn MediaClient>, MediaError>;
}

/// One live connection to the media server. Every method is a remote call.
#[async_trait]
pub trait MediaClient: Send + Sync {
    async fn create_pipeline(&self) -> Result<MediaObjectId, MediaError>;

    async fn create_endpoint(&self, pipeline: &MediaObjectId) -> Result<MediaObjectId, MediaError>;

    /// Returns the SDP answer. Must only be called once per endpoint.
    async fn process_offer(&self, endpoint: &MediaObjectId, offer: &str)
    -> Result<String, MediaError>;

    async fn add_ice_candidate(
        &self,
        endpoint: &MediaObjectId,
        candidate: &IceCandidate,
    ) -> Result<(), MediaError>;

    async fn gather_candidates(&self, endpoint: &MediaObjectId) -> Result<(), MediaError>;

    /// Route media flowing out of `source` into `sink`.
    async fn connect(&self, source: &MediaObjectId, sink: &MediaObjectId)
    -> Result<(), MediaError>;

    /// Stream of local candidates discovered by the endpoint. Ends when the
    /// endpoint is released or the client is closed.
    async fn subscribe_ice_candidates(
        &self,
        endpoint: &MediaObjectId,
    ) -> Result<mpsc::UnboundedReceiver<IceCandidate>, MediaError>;

    async fn release(&self, object: &MediaObjectId) -> Result<(), MediaError>;

    async fn close(&self);
}

/// A media pipeline together with the client that owns it.
#[derive(Clone)]
pub struct Pipeline {
    pub id: MediaObjectId,
    pub(crate) client: Arc<dyn MediaClient>,
}

/// A WebRTC endpoint together with the client that owns it.
#[derive(Clone)]
pub struct Endpoint {
    pub id: MediaObjectId,
    pub(crate) client: Arc<dyn MediaClient>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pipeline").field(&self.id.0).finish()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Endpoint").field(&self.id.0).finish()
    }
}

use super::kurento_protocol::{
    JsonRpcRequest, KurentoFrame, create_endpoint_params, create_pipeline_params,
    ice_candidate_param, invoke_params, release_params, result_value, subscribe_params,
};
use crate::media::{MediaClient, MediaConfig, MediaConnector, MediaError, MediaObjectId};
use async_trait::async_trait;
use beacon_core::IceCandidate;
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens JSON-RPC connections to a Kurento media server.
pub struct KurentoConnector {
    uri: String,
    keepalive_interval: Duration,
}

impl KurentoConnector {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            keepalive_interval: config.keepalive_interval,
        }
    }
}

#[async_trait]
impl MediaConnector for KurentoConnector {
    fn address(&self) -> &str {
        &self.uri
    }

    async fn connect(&self) -> Result<Arc<dyn MediaClient>, MediaError> {
        let client = KurentoClient::connect(&self.uri, self.keepalive_interval).await?;
        Ok(Arc::new(client))
    }
}

struct ClientInner {
    tx: mpsc::UnboundedSender<Message>,
    next_id: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<Result<Value, MediaError>>>,
    subscriptions: DashMap<MediaObjectId, mpsc::UnboundedSender<IceCandidate>>,
    /// Endpoints created on each pipeline, so releasing the pipeline can
    /// end their candidate streams too.
    children: DashMap<MediaObjectId, Vec<MediaObjectId>>,
    session_id: RwLock<Option<String>>,
    closed: AtomicBool,
}

/// Removes a pending request if its caller gives up before the reply.
struct PendingGuard<'a> {
    inner: &'a ClientInner,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner.pending.remove(&self.id);
    }
}

impl ClientInner {
    async fn call(&self, method: &str, mut params: Value) -> Result<Value, MediaError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MediaError::Closed);
        }

        let session = self.session_id.read().await.clone();
        if let (Some(session), Value::Object(map)) = (session, &mut params) {
            map.insert("sessionId".to_owned(), Value::String(session));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(id, reply_tx);
        let _guard = PendingGuard { inner: self, id };

        debug!("Kurento request {} -> {}", id, method);
        self.tx
            .send(Message::Text(text.into()))
            .map_err(|_| MediaError::Closed)?;

        let result = reply_rx.await.map_err(|_| MediaError::Closed)??;

        if let Some(session) = result.get("sessionId").and_then(Value::as_str) {
            let mut current = self.session_id.write().await;
            if current.is_none() {
                *current = Some(session.to_owned());
            }
        }

        Ok(result)
    }

    fn dispatch(&self, text: &str) {
        match KurentoFrame::parse(text) {
            Ok(KurentoFrame::Response(response)) => {
                let Some(id) = response.id else {
                    warn!("Kurento response without id: {}", text);
                    return;
                };
                let Some((_, reply)) = self.pending.remove(&id) else {
                    debug!("Dropping late Kurento response {}", id);
                    return;
                };
                let _ = reply.send(response.into_result());
            }
            Ok(KurentoFrame::Notification(notification)) => {
                let Some(event) = notification.into_event() else {
                    return;
                };
                if !event.is_ice_candidate() {
                    debug!("Ignoring Kurento event {} on {}", event.kind, event.object);
                    return;
                }
                let Some(candidate) = event.ice_candidate() else {
                    warn!("Malformed ICE candidate event on {}", event.object);
                    return;
                };
                let object = MediaObjectId::from(event.object);
                if let Some(subscriber) = self.subscriptions.get(&object) {
                    let _ = subscriber.send(candidate);
                }
            }
            Err(e) => warn!("Unreadable Kurento frame: {}", e),
        }
    }

    fn forget(&self, object: &MediaObjectId) {
        self.subscriptions.remove(object);
        if let Some((_, children)) = self.children.remove(object) {
            for child in children {
                self.subscriptions.remove(&child);
            }
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, reply)) = self.pending.remove(&id) {
                let _ = reply.send(Err(MediaError::Closed));
            }
        }
        self.subscriptions.clear();
        self.children.clear();
    }
}

/// JSON-RPC client for one Kurento connection.
pub struct KurentoClient {
    inner: Arc<ClientInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl KurentoClient {
    pub async fn connect(uri: &str, keepalive_interval: Duration) -> Result<Self, MediaError> {
        info!("Connecting to Kurento at {}", uri);

        let (ws_stream, _) = connect_async(uri)
            .await
            .map_err(|e| MediaError::Connect(e.to_string()))?;
        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ClientInner {
            tx,
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
            subscriptions: DashMap::new(),
            children: DashMap::new(),
            session_id: RwLock::new(None),
            closed: AtomicBool::new(false),
        });

        let tasks = vec![
            tokio::spawn(Self::write_loop(write, rx)),
            tokio::spawn(Self::read_loop(read, inner.clone())),
            tokio::spawn(Self::keepalive_loop(inner.clone(), keepalive_interval)),
        ];

        Ok(Self {
            inner,
            tasks: Mutex::new(tasks),
        })
    }

    async fn write_loop(
        mut write: SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if let Err(e) = write.send(msg).await {
                warn!("Failed to write to Kurento: {}", e);
                break;
            }
            if closing {
                break;
            }
        }
        debug!("Kurento writer finished");
    }

    async fn read_loop(mut read: SplitStream<WsStream>, inner: Arc<ClientInner>) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => inner.dispatch(&text),
                Ok(Message::Close(_)) => {
                    info!("Kurento closed the connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Kurento connection error: {}", e);
                    break;
                }
            }
        }
        inner.shutdown();
    }

    async fn keepalive_loop(inner: Arc<ClientInner>, interval: Duration) {
        let params = json!({ "interval": interval.as_millis() as u64 });
        loop {
            tokio::time::sleep(interval).await;
            if inner.closed.load(Ordering::Acquire) {
                break;
            }
            if let Err(e) = inner.call("ping", params.clone()).await {
                warn!("Kurento keepalive failed: {}", e);
            }
        }
    }

    async fn invoke(
        &self,
        object: &MediaObjectId,
        operation: &str,
        operation_params: Value,
    ) -> Result<Value, MediaError> {
        self.inner
            .call("invoke", invoke_params(object, operation, operation_params))
            .await
    }
}

#[async_trait]
impl MediaClient for KurentoClient {
    async fn create_pipeline(&self) -> Result<MediaObjectId, MediaError> {
        let result = self.inner.call("create", create_pipeline_params()).await?;
        Ok(result_value(&result)?.into())
    }

    async fn create_endpoint(&self, pipeline: &MediaObjectId) -> Result<MediaObjectId, MediaError> {
        let result = self
            .inner
            .call("create", create_endpoint_params(pipeline))
            .await?;
        let endpoint = MediaObjectId::from(result_value(&result)?);
        self.inner
            .children
            .entry(pipeline.clone())
            .or_default()
            .push(endpoint.clone());
        Ok(endpoint)
    }

    async fn process_offer(
        &self,
        endpoint: &MediaObjectId,
        offer: &str,
    ) -> Result<String, MediaError> {
        let result = self
            .invoke(endpoint, "processOffer", json!({ "offer": offer }))
            .await?;
        result_value(&result)
    }

    async fn add_ice_candidate(
        &self,
        endpoint: &MediaObjectId,
        candidate: &IceCandidate,
    ) -> Result<(), MediaError> {
        let params = json!({ "candidate": ice_candidate_param(candidate) });
        self.invoke(endpoint, "addIceCandidate", params).await?;
        Ok(())
    }

    async fn gather_candidates(&self, endpoint: &MediaObjectId) -> Result<(), MediaError> {
        self.invoke(endpoint, "gatherCandidates", json!({})).await?;
        Ok(())
    }

    async fn connect(&self, source: &MediaObjectId, sink: &MediaObjectId) -> Result<(), MediaError> {
        self.invoke(source, "connect", json!({ "sink": sink.0 })).await?;
        Ok(())
    }

    async fn subscribe_ice_candidates(
        &self,
        endpoint: &MediaObjectId,
    ) -> Result<mpsc::UnboundedReceiver<IceCandidate>, MediaError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscriptions.insert(endpoint.clone(), tx);

        if let Err(e) = self.inner.call("subscribe", subscribe_params(endpoint)).await {
            self.inner.subscriptions.remove(endpoint);
            return Err(e);
        }
        Ok(rx)
    }

    async fn release(&self, object: &MediaObjectId) -> Result<(), MediaError> {
        self.inner.forget(object);
        self.inner.call("release", release_params(object)).await?;
        Ok(())
    }

    async fn close(&self) {
        info!("Closing Kurento client");
        let _ = self.inner.tx.send(Message::Close(None));
        self.inner.shutdown();

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks.iter().skip(1) {
            task.abort();
        }
    }
}

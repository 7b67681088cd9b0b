use async_trait::async_trait;
use beacon_core::IceCandidate;
use beacon_server::{MediaClient, MediaConnector, MediaError, MediaObjectId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

pub const MOCK_MEDIA_ADDRESS: &str = "ws://mock-media-server:8888/kurento";

/// Remote operations the mock can block or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaOp {
    Connect,
    CreatePipeline,
    CreateEndpoint,
    ProcessOffer,
    AddIceCandidate,
    GatherCandidates,
    ConnectEndpoints,
    Subscribe,
    Release,
}

/// One remote call as seen by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    CreatePipeline,
    CreateEndpoint { pipeline: String },
    ProcessOffer { endpoint: String },
    AddIceCandidate { endpoint: String, candidate: String },
    GatherCandidates { endpoint: String },
    Connect { source: String, sink: String },
    Subscribe { endpoint: String },
    Release { object: String },
}

#[derive(Default)]
struct MockState {
    calls: Vec<MediaCall>,
    failures: HashSet<MediaOp>,
    unreachable: bool,
    next_object: u64,
    pipelines: HashMap<String, Vec<String>>,
    endpoints: Vec<String>,
    released: Vec<String>,
    subscriptions: HashMap<String, mpsc::UnboundedSender<IceCandidate>>,
    connects: usize,
    closes: usize,
}

struct MockInner {
    state: Mutex<MockState>,
    gates: Mutex<HashMap<MediaOp, watch::Sender<bool>>>,
}

/// In-memory media server. Acts as connector, and every client it hands
/// out shares the same object space and call log.
#[derive(Clone)]
pub struct MockMediaServer {
    inner: Arc<MockInner>,
}

impl MockMediaServer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockInner {
                state: Mutex::new(MockState::default()),
                gates: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.state.lock().unwrap()
    }

    /// Make every future `op` fail with an RPC error.
    pub fn fail(&self, op: MediaOp) {
        self.state().failures.insert(op);
    }

    pub fn heal(&self, op: MediaOp) {
        self.state().failures.remove(&op);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Hold every `op` call until [`unblock`](Self::unblock). Calls are
    /// logged before they wait.
    pub fn block(&self, op: MediaOp) {
        let (tx, _rx) = watch::channel(true);
        self.inner.gates.lock().unwrap().insert(op, tx);
    }

    pub fn unblock(&self, op: MediaOp) {
        if let Some(gate) = self.inner.gates.lock().unwrap().remove(&op) {
            gate.send_replace(false);
        }
    }

    /// Push a local candidate out of `endpoint`, as if the media server had
    /// discovered it. Returns `false` when nobody is subscribed.
    pub fn emit_candidate(&self, endpoint: &str, candidate: IceCandidate) -> bool {
        self.state()
            .subscriptions
            .get(endpoint)
            .is_some_and(|tx| tx.send(candidate).is_ok())
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.state().calls.clone()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.state().endpoints.clone()
    }

    pub fn pipelines(&self) -> Vec<String> {
        let mut pipelines: Vec<_> = self.state().pipelines.keys().cloned().collect();
        pipelines.sort();
        pipelines
    }

    pub fn released(&self) -> Vec<String> {
        self.state().released.clone()
    }

    pub fn is_released(&self, object: &str) -> bool {
        self.state().released.iter().any(|o| o == object)
    }

    /// Candidate strings delivered to `endpoint`, in delivery order.
    pub fn added_candidates(&self, endpoint: &str) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                MediaCall::AddIceCandidate {
                    endpoint: e,
                    candidate,
                } if e == endpoint => Some(candidate.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.state().connects
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    pub fn has_call(&self, call: &MediaCall) -> bool {
        self.state().calls.contains(call)
    }

    /// Polls the call log until `predicate` holds.
    pub async fn wait_for(&self, timeout_ms: u64, predicate: impl Fn(&MockMediaServer) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        while tokio::time::Instant::now() < deadline {
            if predicate(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        predicate(self)
    }

    async fn enter(&self, op: MediaOp, call: Option<MediaCall>) -> Result<(), MediaError> {
        if let Some(call) = call {
            self.state().calls.push(call);
        }

        let gate = self
            .inner
            .gates
            .lock()
            .unwrap()
            .get(&op)
            .map(|tx| tx.subscribe());
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|blocked| !blocked).await;
        }

        if self.state().failures.contains(&op) {
            return Err(MediaError::Rpc {
                code: -32000,
                message: format!("{:?} failed", op),
            });
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state();
        state.next_object += 1;
        format!("{}-{}", prefix, state.next_object)
    }
}

impl Default for MockMediaServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaConnector for MockMediaServer {
    fn address(&self) -> &str {
        MOCK_MEDIA_ADDRESS
    }

    async fn connect(&self) -> Result<Arc<dyn MediaClient>, MediaError> {
        self.enter(MediaOp::Connect, None).await?;

        let mut state = self.state();
        if state.unreachable {
            return Err(MediaError::Connect("connection refused".to_owned()));
        }
        state.connects += 1;
        Ok(Arc::new(MockMediaClient {
            server: self.clone(),
        }))
    }
}

pub struct MockMediaClient {
    server: MockMediaServer,
}

#[async_trait]
impl MediaClient for MockMediaClient {
    async fn create_pipeline(&self) -> Result<MediaObjectId, MediaError> {
        self.server
            .enter(MediaOp::CreatePipeline, Some(MediaCall::CreatePipeline))
            .await?;

        let id = self.server.next_id("pipeline");
        self.server.state().pipelines.insert(id.clone(), Vec::new());
        Ok(id.into())
    }

    async fn create_endpoint(&self, pipeline: &MediaObjectId) -> Result<MediaObjectId, MediaError> {
        let call = MediaCall::CreateEndpoint {
            pipeline: pipeline.0.clone(),
        };
        self.server.enter(MediaOp::CreateEndpoint, Some(call)).await?;

        let id = format!("{}/{}", pipeline, self.server.next_id("endpoint"));
        let mut state = self.server.state();
        state
            .pipelines
            .entry(pipeline.0.clone())
            .or_default()
            .push(id.clone());
        state.endpoints.push(id.clone());
        Ok(id.into())
    }

    async fn process_offer(
        &self,
        endpoint: &MediaObjectId,
        _offer: &str,
    ) -> Result<String, MediaError> {
        let call = MediaCall::ProcessOffer {
            endpoint: endpoint.0.clone(),
        };
        self.server.enter(MediaOp::ProcessOffer, Some(call)).await?;
        Ok(format!("answer-for-{}", endpoint))
    }

    async fn add_ice_candidate(
        &self,
        endpoint: &MediaObjectId,
        candidate: &IceCandidate,
    ) -> Result<(), MediaError> {
        let call = MediaCall::AddIceCandidate {
            endpoint: endpoint.0.clone(),
            candidate: candidate.candidate.clone(),
        };
        self.server.enter(MediaOp::AddIceCandidate, Some(call)).await
    }

    async fn gather_candidates(&self, endpoint: &MediaObjectId) -> Result<(), MediaError> {
        let call = MediaCall::GatherCandidates {
            endpoint: endpoint.0.clone(),
        };
        self.server.enter(MediaOp::GatherCandidates, Some(call)).await
    }

    async fn connect(&self, source: &MediaObjectId, sink: &MediaObjectId) -> Result<(), MediaError> {
        let call = MediaCall::Connect {
            source: source.0.clone(),
            sink: sink.0.clone(),
        };
        self.server.enter(MediaOp::ConnectEndpoints, Some(call)).await
    }

    async fn subscribe_ice_candidates(
        &self,
        endpoint: &MediaObjectId,
    ) -> Result<mpsc::UnboundedReceiver<IceCandidate>, MediaError> {
        let call = MediaCall::Subscribe {
            endpoint: endpoint.0.clone(),
        };
        self.server.enter(MediaOp::Subscribe, Some(call)).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.server.state().subscriptions.insert(endpoint.0.clone(), tx);
        Ok(rx)
    }

    async fn release(&self, object: &MediaObjectId) -> Result<(), MediaError> {
        let call = MediaCall::Release {
            object: object.0.clone(),
        };
        self.server.enter(MediaOp::Release, Some(call)).await?;

        let mut state = self.server.state();
        let children = state.pipelines.remove(&object.0).unwrap_or_default();
        for child in &children {
            state.subscriptions.remove(child);
        }
        state.subscriptions.remove(&object.0);
        state.released.push(object.0.clone());
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.server.state();
        state.closes += 1;
        state.subscriptions.clear();
    }
}

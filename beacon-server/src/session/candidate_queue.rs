use beacon_core::{IceCandidate, SessionId};
use std::collections::{HashMap, VecDeque};

/// Candidates that arrived before their session had a media endpoint,
/// kept in arrival order per session.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    pending: HashMap<SessionId, VecDeque<IceCandidate>>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, session: SessionId, candidate: IceCandidate) {
        self.pending.entry(session).or_default().push_back(candidate);
    }

    /// Removes and returns everything queued for `session`, oldest first.
    pub fn drain(&mut self, session: SessionId) -> Vec<IceCandidate> {
        self.pending
            .remove(&session)
            .map(Vec::from)
            .unwrap_or_default()
    }

    pub fn clear(&mut self, session: SessionId) {
        self.pending.remove(&session);
    }

    pub fn len(&self, session: SessionId) -> usize {
        self.pending.get(&session).map_or(0, VecDeque::len)
    }
}

use crate::media::{CandidateSink, Endpoint, Pipeline};
use crate::session::SessionError;
use beacon_core::SessionId;
use std::collections::HashMap;

/// Identifies one negotiation attempt. Tickets are never reused, so a
/// stale negotiation can tell that its slot was handed to someone else
/// even when the session id is the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NegotiationTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Negotiating,
    Active,
    Terminated,
}

impl SessionPhase {
    pub fn can_advance_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Idle, Negotiating) | (Negotiating, Active) | (Idle | Negotiating | Active, Terminated)
        )
    }
}

/// The single broadcasting session. Pipeline and endpoint are filled in
/// while the presenter negotiates.
pub struct PresenterSession {
    pub id: SessionId,
    pub ticket: NegotiationTicket,
    pub phase: SessionPhase,
    pub pipeline: Option<Pipeline>,
    pub endpoint: Option<Endpoint>,
    pub(crate) candidates: Option<CandidateSink>,
}

pub struct ViewerSession {
    pub id: SessionId,
    pub ticket: NegotiationTicket,
    /// Ticket of the presenter whose pipeline owns `endpoint`.
    pub presenter: NegotiationTicket,
    pub phase: SessionPhase,
    pub endpoint: Endpoint,
    pub(crate) candidates: CandidateSink,
}

#[derive(Debug, Clone, Copy)]
struct PendingViewer {
    ticket: NegotiationTicket,
    presenter: NegotiationTicket,
}

/// Presenter slot and viewer set. Callers serialize all access.
#[derive(Default)]
pub struct SessionRegistry {
    presenter: Option<PresenterSession>,
    viewers: HashMap<SessionId, ViewerSession>,
    pending_viewers: HashMap<SessionId, PendingViewer>,
    last_ticket: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue_ticket(&mut self) -> NegotiationTicket {
        self.last_ticket += 1;
        NegotiationTicket(self.last_ticket)
    }

    /// Claims the presenter slot for `id` before any media object exists.
    pub fn register_presenter(&mut self, id: SessionId) -> Result<NegotiationTicket, SessionError> {
        if self.presenter.is_some() {
            return Err(SessionError::PresenterBusy);
        }

        let ticket = self.issue_ticket();
        self.presenter = Some(PresenterSession {
            id,
            ticket,
            phase: SessionPhase::Negotiating,
            pipeline: None,
            endpoint: None,
            candidates: None,
        });
        Ok(ticket)
    }

    /// Reserves a viewer slot under the presenter holding `presenter`
    /// before the viewer's endpoint exists, so that a `stop` arriving while
    /// the endpoint is created can cancel the negotiation.
    pub fn reserve_viewer(
        &mut self,
        id: SessionId,
        presenter: NegotiationTicket,
    ) -> Result<NegotiationTicket, SessionError> {
        if self.current_presenter(presenter).is_none() {
            return Err(SessionError::NoActivePresenter);
        }

        let ticket = self.issue_ticket();
        self.pending_viewers
            .insert(id, PendingViewer { ticket, presenter });
        Ok(ticket)
    }

    /// Turns the reservation holding `ticket` into a registered viewer.
    /// Fails if the reservation was cancelled or its presenter is gone.
    pub fn register_viewer(
        &mut self,
        id: SessionId,
        ticket: NegotiationTicket,
        endpoint: Endpoint,
        candidates: CandidateSink,
    ) -> Result<(), SessionError> {
        let pending = match self.pending_viewers.get(&id) {
            Some(pending) if pending.ticket == ticket => *pending,
            _ => return Err(SessionError::NoActivePresenter),
        };
        self.pending_viewers.remove(&id);

        if self.current_presenter(pending.presenter).is_none() {
            return Err(SessionError::NoActivePresenter);
        }

        self.viewers.insert(
            id,
            ViewerSession {
                id,
                ticket,
                presenter: pending.presenter,
                phase: SessionPhase::Negotiating,
                endpoint,
                candidates,
            },
        );
        Ok(())
    }

    /// Drops a reservation whose endpoint is still being created.
    pub fn cancel_viewer(&mut self, id: SessionId) -> Option<NegotiationTicket> {
        self.pending_viewers.remove(&id).map(|pending| pending.ticket)
    }

    pub fn presenter(&self) -> Option<&PresenterSession> {
        self.presenter.as_ref()
    }

    /// The presenter, if it is still the one that holds `ticket`.
    pub fn current_presenter(&self, ticket: NegotiationTicket) -> Option<&PresenterSession> {
        self.presenter.as_ref().filter(|p| p.ticket == ticket)
    }

    pub fn current_presenter_mut(
        &mut self,
        ticket: NegotiationTicket,
    ) -> Option<&mut PresenterSession> {
        self.presenter.as_mut().filter(|p| p.ticket == ticket)
    }

    pub fn is_presenter(&self, id: SessionId) -> bool {
        self.presenter.as_ref().is_some_and(|p| p.id == id)
    }

    pub fn viewer(&self, id: SessionId) -> Option<&ViewerSession> {
        self.viewers.get(&id)
    }

    pub fn viewer_ids(&self) -> Vec<SessionId> {
        self.viewers.keys().copied().collect()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presenter.is_none() && self.viewers.is_empty() && self.pending_viewers.is_empty()
    }

    /// Ticket of whatever negotiation currently owns `id`.
    pub fn ticket_of(&self, id: SessionId) -> Option<NegotiationTicket> {
        match &self.presenter {
            Some(p) if p.id == id => Some(p.ticket),
            _ => self
                .viewers
                .get(&id)
                .map(|v| v.ticket)
                .or_else(|| self.pending_viewers.get(&id).map(|v| v.ticket)),
        }
    }

    pub fn phase_of(&self, id: SessionId) -> SessionPhase {
        match &self.presenter {
            Some(p) if p.id == id => p.phase,
            _ => match self.viewers.get(&id) {
                Some(v) => v.phase,
                None if self.pending_viewers.contains_key(&id) => SessionPhase::Negotiating,
                None => SessionPhase::Idle,
            },
        }
    }

    /// Moves the negotiation holding `ticket` to `Active`.
    pub fn mark_active(&mut self, id: SessionId, ticket: NegotiationTicket) -> bool {
        let phase = match &mut self.presenter {
            Some(p) if p.id == id && p.ticket == ticket => &mut p.phase,
            _ => match self.viewers.get_mut(&id) {
                Some(v) if v.ticket == ticket => &mut v.phase,
                _ => return false,
            },
        };

        if !phase.can_advance_to(SessionPhase::Active) {
            return false;
        }
        *phase = SessionPhase::Active;
        true
    }

    /// Where candidates from `id` go once its endpoint exists.
    pub fn candidate_sink(&self, id: SessionId) -> Option<&CandidateSink> {
        match &self.presenter {
            Some(p) if p.id == id => p.candidates.as_ref(),
            _ => self.viewers.get(&id).map(|v| &v.candidates),
        }
    }

    /// Clears the presenter slot and, with it, every viewer.
    pub fn remove_presenter(&mut self) -> Option<(PresenterSession, Vec<ViewerSession>)> {
        let mut presenter = self.presenter.take()?;
        presenter.phase = SessionPhase::Terminated;
        self.pending_viewers.clear();

        let viewers = self
            .viewers
            .drain()
            .map(|(_, mut viewer)| {
                viewer.phase = SessionPhase::Terminated;
                viewer
            })
            .collect();

        Some((presenter, viewers))
    }

    pub fn remove_viewer(&mut self, id: SessionId) -> Option<ViewerSession> {
        let mut viewer = self.viewers.remove(&id)?;
        viewer.phase = SessionPhase::Terminated;
        Some(viewer)
    }
}

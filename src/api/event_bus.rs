use crate::replica::{ElectionStateChangeListener, ElectionStateSnapshot, StateKind, Term};

// Only election events for now. Topic lifecycle events are observable through the registry's
// listeners instead.

/// An event that happened, as observed by the local raft node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RaftEvent {
    /// An event of leader election or timeout. Consuming this event type is subtle. It doesn't queue
    /// intermediate events. If there are multiple events between when application awaits the next event,
    /// those events will be clobbered into only the most recent event.
    Election(RaftElectionState),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RaftElectionState {
    pub role: StateKind,
    pub term: Term,
}

#[derive(Clone)]
pub struct RaftEventListener {
    election_state_change_listener: ElectionStateChangeListener,
}

impl RaftEventListener {
    pub(crate) fn new(election_state_change_listener: ElectionStateChangeListener) -> Self {
        RaftEventListener {
            election_state_change_listener,
        }
    }

    pub fn current_election_state(&self) -> RaftElectionState {
        self.election_state_change_listener.current().into()
    }

    /// `next_event()` returns the next event that this local raft node observes. None once the
    /// node has stopped.
    pub async fn next_event(&mut self) -> Option<RaftEvent> {
        self.election_state_change_listener
            .next()
            .await
            .map(|election_state| RaftEvent::Election(election_state.into()))
    }
}

// ------- Conversions --------

impl From<ElectionStateSnapshot> for RaftElectionState {
    fn from(snapshot: ElectionStateSnapshot) -> Self {
        RaftElectionState {
            role: snapshot.state,
            term: snapshot.term,
        }
    }
}

use crate::replica::{StateKind, Term};
use tokio::sync::watch;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ElectionStateSnapshot {
    pub state: StateKind,
    pub term: Term,
}

pub(crate) fn new(initial_state: ElectionStateSnapshot) -> (ElectionStateChangeNotifier, ElectionStateChangeListener) {
    let (snd, rcv) = watch::channel(initial_state);

    (ElectionStateChangeNotifier { snd }, ElectionStateChangeListener { rcv })
}

pub(crate) struct ElectionStateChangeNotifier {
    snd: watch::Sender<ElectionStateSnapshot>,
}

impl ElectionStateChangeNotifier {
    pub(crate) fn notify_new_state(&self, new_state: ElectionStateSnapshot) {
        let _ = self.snd.send(new_state);
    }
}

/// Observes a node's election state. Intermediate states are clobbered if nobody is awaiting
/// `next()` when they happen.
#[derive(Clone)]
pub struct ElectionStateChangeListener {
    rcv: watch::Receiver<ElectionStateSnapshot>,
}

impl ElectionStateChangeListener {
    pub fn current(&self) -> ElectionStateSnapshot {
        *self.rcv.borrow()
    }

    /// Returns None once the node has stopped.
    pub async fn next(&mut self) -> Option<ElectionStateSnapshot> {
        match self.rcv.changed().await {
            Ok(_) => Some(*self.rcv.borrow()),
            Err(_) => None,
        }
    }
}

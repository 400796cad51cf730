use crate::commitlog::Index;
use crate::replica::write_ahead_log::{CommitResult, LogEntry, LogError, ReplicatedLog};
use crate::replica::Term;
use std::sync::Arc;

/// Observer of a single topic's log. Callbacks run on the thread mutating the log, with the log
/// lock held, so they must not block and must not touch the same log.
pub trait LogChangeListener: Send + Sync {
    fn on_append(&self, _index: Index, _entry: &LogEntry) {}

    fn on_commit(&self, index: Index, entry: &LogEntry);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LogListenerId(u64);

/// ObservedLog decorates a replicated log and tells listeners about every append and every newly
/// committed index. Notification only happens after the wrapped log's mutation succeeded.
pub struct ObservedLog<R> {
    inner: R,
    listeners: Vec<(LogListenerId, Arc<dyn LogChangeListener>)>,
    next_listener_id: u64,
}

impl<R: ReplicatedLog> ObservedLog<R> {
    pub fn new(inner: R) -> Self {
        ObservedLog {
            inner,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    pub fn register_listener(&mut self, listener: Arc<dyn LogChangeListener>) -> LogListenerId {
        let id = LogListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));

        id
    }

    pub fn deregister_listener(&mut self, id: LogListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);

        self.listeners.len() != before
    }

    fn notify_append(&self, index: Index, entry: &LogEntry) {
        for (_, listener) in self.listeners.iter() {
            listener.on_append(index, entry);
        }
    }
}

impl<R: ReplicatedLog> ReplicatedLog for ObservedLog<R> {
    fn commit_index(&self) -> Index {
        self.inner.commit_index()
    }

    fn last_index(&self) -> Index {
        self.inner.last_index()
    }

    fn last_entry(&self) -> Option<(Term, Index)> {
        self.inner.last_entry()
    }

    fn append(&mut self, entry: LogEntry) -> Result<Index, LogError> {
        let index = self.inner.append(entry.clone())?;
        self.notify_append(index, &entry);

        Ok(index)
    }

    fn append_at(&mut self, index: Index, entry: LogEntry) -> Result<Index, LogError> {
        let index = self.inner.append_at(index, entry.clone())?;
        self.notify_append(index, &entry);

        Ok(index)
    }

    fn read(&self, index: Index) -> Result<Option<LogEntry>, LogError> {
        self.inner.read(index)
    }

    fn read_range(&self, from: Index, to: Index) -> Result<Vec<LogEntry>, LogError> {
        self.inner.read_range(from, to)
    }

    fn commit(&mut self, index: Index) -> Result<CommitResult, LogError> {
        let result = self.inner.commit(index)?;
        for (committed_index, entry) in result.indexed() {
            for (_, listener) in self.listeners.iter() {
                listener.on_commit(committed_index, entry);
            }
        }

        Ok(result)
    }

    fn revert(&mut self, index: Index) -> Result<(), LogError> {
        self.inner.revert(index)
    }
}

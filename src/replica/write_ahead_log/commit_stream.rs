use crate::commitlog::Index;
use crate::replica::write_ahead_log::{LogChangeListener, LogEntry};
use crate::replica::Term;
use bytes::Bytes;
use tokio::sync::mpsc;

pub(crate) struct CommitStreamPublisher {
    logger: slog::Logger,
    sender: mpsc::UnboundedSender<CommittedEntry>,
}

/// CommitStream yields a topic's committed entries in index order, each exactly once.
pub struct CommitStream {
    receiver: mpsc::UnboundedReceiver<CommittedEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommittedEntry {
    pub term: Term,
    pub index: Index,
    pub data: Bytes,
}

pub(crate) fn new(logger: slog::Logger) -> (CommitStreamPublisher, CommitStream) {
    let (tx, rx) = mpsc::unbounded_channel();

    let publisher = CommitStreamPublisher { logger, sender: tx };
    let stream = CommitStream { receiver: rx };

    (publisher, stream)
}

impl LogChangeListener for CommitStreamPublisher {
    fn on_commit(&self, index: Index, entry: &LogEntry) {
        let committed_entry = CommittedEntry {
            term: entry.term,
            index,
            data: entry.data.clone(),
        };

        if self.sender.send(committed_entry).is_err() {
            slog::debug!(self.logger, "CommitStream has disconnected.");
        }
    }
}

impl CommitStream {
    pub async fn recv(&mut self) -> Option<CommittedEntry> {
        self.receiver.recv().await
    }
}

use crate::commitlog::InMemoryLog;
use crate::replica::write_ahead_log::{commit_stream, CommitStream, LogEntry, ObservedLog, WriteAheadLog};
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) type TopicLog = ObservedLog<WriteAheadLog<InMemoryLog<LogEntry>>>;

/// Every topic's log is shared between the node's actor (appends from AppendEntries and client
/// writes) and the leader's replication controller for that topic. Lock scopes never cross an
/// `.await`.
pub(crate) type SharedTopicLog = Arc<Mutex<TopicLog>>;

pub(crate) fn new_topic_log() -> SharedTopicLog {
    let log = ObservedLog::new(WriteAheadLog::new(InMemoryLog::new()));

    Arc::new(Mutex::new(log))
}

pub(crate) fn lock_log(log: &SharedTopicLog) -> MutexGuard<'_, TopicLog> {
    // Log mutations either complete or leave the log untouched, so a poisoned lock is still
    // consistent.
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Attaches a fresh commit stream to `log`. Only commits after this call are published.
pub(crate) fn subscribe_commits(logger: slog::Logger, log: &mut TopicLog) -> CommitStream {
    let (publisher, stream) = commit_stream::new(logger);
    log.register_listener(Arc::new(publisher));

    stream
}

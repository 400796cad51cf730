//! This module is a raft-specific commit log that wraps the generic commit log: each topic owns
//! one, wrapped by a decorator that publishes append and commit notifications.

mod commit_stream;
mod log;
mod log_entry;
mod observed;
mod wiring;

pub use commit_stream::CommitStream;
pub use commit_stream::CommittedEntry;
pub use log::CommitResult;
pub use log::LogError;
pub use log::LogSnapshot;
pub use log::ReplicatedLog;
pub use log::WriteAheadLog;
pub use log_entry::LogEntry;
pub use observed::LogChangeListener;
pub use observed::LogListenerId;
pub use observed::ObservedLog;

pub(crate) use wiring::lock_log;
pub(crate) use wiring::new_topic_log;
pub(crate) use wiring::subscribe_commits;
pub(crate) use wiring::SharedTopicLog;
pub(crate) use wiring::TopicLog;

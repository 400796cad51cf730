use crate::commitlog::Index;
use crate::replica::local_state::Term;
use crate::replica::peers::NodeId;
use crate::replica::topic::TopicId;
use crate::replica::write_ahead_log::{CommittedEntry, LogEntry, LogError};
use bytes::Bytes;
use std::collections::HashMap;

/// Client operation categories a raft state may serve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpCategory {
    Read,
    Write,
}

#[derive(Clone, Debug)]
pub struct AppendEntriesInput {
    pub leader_term: Term,
    pub leader_id: NodeId,
    pub topic_id: TopicId,
    // "Previous log entry" is the log entry immediately preceding the new ones. None means the new
    // entries start at the beginning of the log.
    pub leader_previous_log_entry: Option<(Term, Index)>,
    pub leader_commit_index: Index,
    pub new_entries: Vec<LogEntry>,
}

impl AppendEntriesInput {
    pub(crate) fn previous_log_index(&self) -> Index {
        self.leader_previous_log_entry
            .map(|(_, index)| index)
            .unwrap_or_else(Index::zero)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppendEntriesOutput {
    /// Receiver's current term, for the leader to notice it's stale.
    pub term: Term,
    /// On success, the index of the last entry the receiver now has in common with the leader.
    pub result: Result<Index, AppendEntriesRejection>,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum AppendEntriesRejection {
    #[error("Leader is not in cluster")]
    ClientNotInCluster,
    #[error("Leader's term is out of date")]
    StaleTerm,
    #[error("Receiver is not a follower")]
    NotFollower,
    #[error("Receiver is missing previous log entry")]
    MissingPreviousEntry,
    #[error("Receiver doesn't know topic")]
    UnknownTopic,
    #[error("Receiver had a local log failure: {0}")]
    LocalLogFailure(String),
}

#[derive(Clone, Debug)]
pub struct RequestVoteInput {
    pub candidate_term: Term,
    pub candidate_id: NodeId,
    /// Last entry of every non-empty topic log the candidate holds.
    pub candidate_last_log_entries: HashMap<TopicId, (Term, Index)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestVoteOutput {
    pub term: Term,
    pub vote_granted: bool,
}

#[derive(Debug)]
pub(crate) struct ReadInput {
    pub(crate) namespace: String,
    pub(crate) index: Index,
}

/// `None` when nothing is committed at the requested index yet.
pub(crate) type ReadOutput = Option<CommittedEntry>;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Not leader. Known leader: {known_leader:?}")]
    NotLeader { known_leader: Option<NodeId> },
    #[error("Unknown topic {0}")]
    UnknownTopic(String),
    #[error("Failed to read from log: {0}")]
    Log(#[from] LogError),
    #[error("Replica actor is dead RIP")]
    ActorExited,
}

#[derive(Debug)]
pub(crate) struct WriteInput {
    pub(crate) namespace: String,
    pub(crate) data: Bytes,
}

/// Where a write landed in its topic's log. Appended, not yet committed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WriteOutput {
    pub term: Term,
    pub index: Index,
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Not leader. Known leader: {known_leader:?}")]
    NotLeader { known_leader: Option<NodeId> },
    #[error("Unknown topic {0}")]
    UnknownTopic(String),
    #[error("Topic {0} can't be modified by clients")]
    ProtectedTopic(String),
    #[error("Failed to encode control command: {0}")]
    Encoding(String),
    #[error("Failed to append to log: {0}")]
    Log(#[from] LogError),
    #[error("Replica actor is dead RIP")]
    ActorExited,
}

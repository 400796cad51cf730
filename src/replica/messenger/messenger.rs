use crate::replica::peers::Node;
use crate::replica::replica_api::{AppendEntriesInput, AppendEntriesOutput, RequestVoteInput, RequestVoteOutput};
use std::future::Future;
use tokio::time::Duration;

/// Result of sending one RPC to one peer. Both failure kinds mean "no answer"; neither is ever
/// read as a negative reply.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome<T> {
    Succeeded(T),
    TimedOut,
    TransportError(String),
}

/// ClusterMessenger sends raft RPCs to other cluster members. Wire transport lives behind this
/// trait.
#[async_trait::async_trait]
pub trait ClusterMessenger: Send + Sync {
    async fn append_entries(&self, node: &Node, input: AppendEntriesInput) -> DispatchOutcome<AppendEntriesOutput>;

    async fn request_vote(&self, node: &Node, input: RequestVoteInput) -> DispatchOutcome<RequestVoteOutput>;
}

/// Bounds a single dispatch by `rpc_timeout`.
pub(crate) async fn with_timeout<T, F>(rpc_timeout: Duration, dispatch: F) -> DispatchOutcome<T>
where
    F: Future<Output = DispatchOutcome<T>>,
{
    match tokio::time::timeout(rpc_timeout, dispatch).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => DispatchOutcome::TimedOut,
    }
}

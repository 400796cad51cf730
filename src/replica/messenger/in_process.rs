use crate::actor::{ActorClient, WeakActorClient};
use crate::api::RaftNode;
use crate::replica::messenger::{ClusterMessenger, DispatchOutcome};
use crate::replica::peers::{Node, NodeId};
use crate::replica::replica_api::{AppendEntriesInput, AppendEntriesOutput, RequestVoteInput, RequestVoteOutput};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// InProcessNetwork connects nodes running in the same process by handing requests straight to
/// the receiver's actor. Nodes can be cut off to simulate partitions.
#[derive(Clone, Default)]
pub struct InProcessNetwork {
    state: Arc<Mutex<NetworkState>>,
}

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<NodeId, WeakActorClient>,
    isolated: HashSet<NodeId>,
    dispatch_counts: HashMap<NodeId, usize>,
}

impl InProcessNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Messenger to use in the config of node `from`.
    pub fn messenger_for(&self, from: NodeId) -> Arc<dyn ClusterMessenger> {
        Arc::new(InProcessMessenger {
            from,
            network: self.clone(),
        })
    }

    /// Makes `node` reachable by its peers.
    pub fn register(&self, node: &RaftNode) {
        self.attach(node.node_id().clone(), node.weak_actor_client());
    }

    fn attach(&self, node_id: NodeId, actor_client: WeakActorClient) {
        self.lock().nodes.insert(node_id, actor_client);
    }

    /// Drops every request from or to `node_id` until healed.
    pub fn isolate(&self, node_id: &NodeId) {
        self.lock().isolated.insert(node_id.clone());
    }

    pub fn heal(&self, node_id: &NodeId) {
        self.lock().isolated.remove(node_id);
    }

    /// Number of requests `node_id` has sent that made it onto the network.
    pub fn dispatch_count(&self, node_id: &NodeId) -> usize {
        self.lock().dispatch_counts.get(node_id).copied().unwrap_or(0)
    }

    fn route(&self, from: &NodeId, to: &NodeId) -> Result<ActorClient, String> {
        let mut state = self.lock();
        if state.isolated.contains(from) || state.isolated.contains(to) {
            return Err(format!("{} -> {} is partitioned", from, to));
        }
        *state.dispatch_counts.entry(from.clone()).or_insert(0) += 1;

        state
            .nodes
            .get(to)
            .and_then(|client| client.upgrade())
            .ok_or_else(|| format!("{} is not running", to))
    }
}

struct InProcessMessenger {
    from: NodeId,
    network: InProcessNetwork,
}

#[async_trait::async_trait]
impl ClusterMessenger for InProcessMessenger {
    async fn append_entries(&self, node: &Node, input: AppendEntriesInput) -> DispatchOutcome<AppendEntriesOutput> {
        let client = match self.network.route(&self.from, &node.id) {
            Ok(client) => client,
            Err(e) => return DispatchOutcome::TransportError(e),
        };

        match client.append_entries(input).await {
            Ok(output) => DispatchOutcome::Succeeded(output),
            Err(e) => DispatchOutcome::TransportError(e.to_string()),
        }
    }

    async fn request_vote(&self, node: &Node, input: RequestVoteInput) -> DispatchOutcome<RequestVoteOutput> {
        let client = match self.network.route(&self.from, &node.id) {
            Ok(client) => client,
            Err(e) => return DispatchOutcome::TransportError(e),
        };

        match client.request_vote(input).await {
            Ok(output) => DispatchOutcome::Succeeded(output),
            Err(e) => DispatchOutcome::TransportError(e.to_string()),
        }
    }
}

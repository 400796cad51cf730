use crate::actor::WeakActorClient;
use crate::commitlog::Index;
use crate::replica::control::KnownLeader;
use crate::replica::election::{ElectionStateChangeNotifier, ElectionStateSnapshot};
use crate::replica::local_state::{PersistentLocalState, Term};
use crate::replica::messenger::ClusterMessenger;
use crate::replica::peers::{ClusterSet, NodeId};
use crate::replica::states::StateKind;
use crate::replica::topic::{TopicId, TopicRegistry};
use crate::replica::write_ahead_log::{lock_log, ReplicatedLog};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Duration;

#[derive(Clone, Debug)]
pub(crate) struct ReplicaTimings {
    pub(crate) broadcast_interval: Duration,
    pub(crate) election_min_timeout: Duration,
    pub(crate) election_max_timeout: Duration,
    pub(crate) rpc_timeout: Duration,
    pub(crate) max_entries_per_append: usize,
}

/// NodeContext is everything about a node which outlives any single raft state.
pub(crate) struct NodeContext {
    pub(crate) logger: slog::Logger,
    pub(crate) cluster: ClusterSet,
    pub(crate) local_state: Box<dyn PersistentLocalState>,
    pub(crate) registry: TopicRegistry,
    pub(crate) known_leader: KnownLeader,
    pub(crate) messenger: Arc<dyn ClusterMessenger>,
    pub(crate) timings: ReplicaTimings,
    pub(crate) actor_client: WeakActorClient,
    pub(crate) state_change_notifier: ElectionStateChangeNotifier,
}

impl NodeContext {
    pub(crate) fn my_node_id(&self) -> &NodeId {
        &self.cluster.local_node().id
    }

    pub(crate) fn current_term(&self) -> Term {
        self.local_state.current_term()
    }

    /// Last `(term, index)` of every topic log that holds at least one entry.
    pub(crate) fn last_log_entries(&self) -> HashMap<TopicId, (Term, Index)> {
        self.registry
            .topics()
            .into_iter()
            .filter_map(|topic| {
                let last_entry = lock_log(topic.log()).last_entry();
                last_entry.map(|last_entry| (topic.id().clone(), last_entry))
            })
            .collect()
    }

    pub(crate) fn publish_state(&self, state: StateKind) {
        self.state_change_notifier.notify_new_state(ElectionStateSnapshot {
            state,
            term: self.current_term(),
        });
    }
}

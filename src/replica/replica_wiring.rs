use crate::actor::WeakActorClient;
use crate::replica::control::KnownLeader;
use crate::replica::election::{state_change_channel, ElectionStateChangeListener, ElectionStateSnapshot};
use crate::replica::local_state::{Term, VolatileLocalState};
use crate::replica::messenger::ClusterMessenger;
use crate::replica::peers::ClusterSet;
use crate::replica::replica::Replica;
use crate::replica::states::{default_rules, NodeContext, ReplicaTimings, StateKind};
use crate::replica::topic::TopicRegistry;
use std::sync::Arc;

pub(crate) struct ReplicaConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) cluster: ClusterSet,
    pub(crate) registry: TopicRegistry,
    pub(crate) known_leader: KnownLeader,
    pub(crate) messenger: Arc<dyn ClusterMessenger>,
    pub(crate) timings: ReplicaTimings,
    pub(crate) actor_client: WeakActorClient,
}

pub(crate) fn create_replica(config: ReplicaConfig) -> (Replica, ElectionStateChangeListener) {
    let my_node_id = config.cluster.local_node().id.clone();
    let (state_change_notifier, state_change_listener) = state_change_channel(ElectionStateSnapshot {
        state: StateKind::Follower,
        term: Term::new(0),
    });

    let ctx = NodeContext {
        logger: config.logger,
        cluster: config.cluster,
        local_state: Box::new(VolatileLocalState::new(my_node_id)),
        registry: config.registry,
        known_leader: config.known_leader,
        messenger: config.messenger,
        timings: config.timings,
        actor_client: config.actor_client,
        state_change_notifier,
    };

    (Replica::new(ctx, default_rules()), state_change_listener)
}

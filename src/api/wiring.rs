use crate::actor::{ActorClient, ReplicaActor};
use crate::api::client::RaftNode;
use crate::api::event_bus::RaftEventListener;
use crate::api::options::RaftOptionsValidated;
use crate::replica;
use crate::replica::{
    ClusterMessenger, ClusterSet, ClusterSetError, ControlLogConsumer, KnownLeader, Node, NodeId, ReplicaConfig,
    TopicRegistry,
};
use crate::RaftOptions;
use std::convert::TryFrom;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct NodeConfig {
    pub node_id: NodeId,
    /// Every member of the cluster, including this node.
    pub cluster_members: Vec<Node>,
    pub logger: slog::Logger,
    pub options: RaftOptions,
    pub messenger: Arc<dyn ClusterMessenger>,
}

#[derive(Debug, thiserror::Error)]
pub enum NodeCreationError {
    #[error("Invalid cluster info: {0}")]
    InvalidClusterInfo(#[from] ClusterSetError),
    #[error("Illegal options for configuring node: {0}")]
    IllegalOptions(String),
}

/// Starts a node's background tasks. Must be called from within a tokio runtime.
pub fn try_create_node(config: NodeConfig) -> Result<RaftNode, NodeCreationError> {
    let options =
        RaftOptionsValidated::try_from(config.options).map_err(|e| NodeCreationError::IllegalOptions(e.to_string()))?;
    let cluster = ClusterSet::try_new(&config.node_id, config.cluster_members)?;

    let logger = config.logger.new(slog::o!("Node" => config.node_id.to_string()));
    let registry = TopicRegistry::new(logger.clone());
    let known_leader = KnownLeader::default();

    // Subscribe before the actor runs, so no control commit is missed.
    let control_topic = registry.control_topic();
    let control_commits = replica::subscribe_commits(
        logger.new(slog::o!("Topic" => control_topic.namespace().to_string())),
        &mut replica::lock_log(control_topic.log()),
    );

    let (actor_client, actor_queue_rx) = ActorClient::new(64);

    let (replica, election_state_change_listener) = replica::create_replica(ReplicaConfig {
        logger: logger.clone(),
        cluster,
        registry: registry.clone(),
        known_leader: known_leader.clone(),
        messenger: config.messenger,
        timings: options.timings(),
        actor_client: actor_client.weak(),
    });

    let replica_actor = ReplicaActor::new(logger.clone(), actor_queue_rx, replica);
    tokio::spawn(replica_actor.run_event_loop());

    let consumer_cancel = CancellationToken::new();
    let consumer = ControlLogConsumer::new(logger.clone(), registry.clone(), known_leader.clone());
    let consumer_handle = tokio::spawn(consumer.run(control_commits, consumer_cancel.clone()));

    Ok(RaftNode::new(
        logger,
        config.node_id,
        actor_client,
        registry,
        known_leader,
        RaftEventListener::new(election_state_change_listener),
        (consumer_cancel, consumer_handle),
    ))
}

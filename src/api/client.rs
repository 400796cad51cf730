use crate::actor::{ActorClient, ActorExited, WeakActorClient};
use crate::api::event_bus::RaftEventListener;
use crate::replica;
use crate::replica::{
    CommitStream, CommittedEntry, ControlCommand, KnownLeader, NodeId, ReadError, Topic, TopicRegistry, WriteError,
    WriteOutput, CONTROL_NAMESPACE,
};
use crate::Index;
use bytes::Bytes;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// RaftNode is the application's handle to one local raft node.
pub struct RaftNode {
    logger: slog::Logger,
    node_id: NodeId,
    actor_client: ActorClient,
    registry: TopicRegistry,
    known_leader: KnownLeader,
    event_listener: RaftEventListener,
    control_consumer: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl RaftNode {
    pub(crate) fn new(
        logger: slog::Logger,
        node_id: NodeId,
        actor_client: ActorClient,
        registry: TopicRegistry,
        known_leader: KnownLeader,
        event_listener: RaftEventListener,
        control_consumer: (CancellationToken, JoinHandle<()>),
    ) -> Self {
        RaftNode {
            logger,
            node_id,
            actor_client,
            registry,
            known_leader,
            event_listener,
            control_consumer: Mutex::new(Some(control_consumer)),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub(crate) fn weak_actor_client(&self) -> WeakActorClient {
        self.actor_client.weak()
    }

    /// Appends `data` to the topic's log. Only the leader accepts writes. The entry is committed
    /// once it shows up on the topic's commit stream.
    pub async fn write(&self, namespace: &str, data: Bytes) -> Result<WriteOutput, WriteError> {
        if namespace == CONTROL_NAMESPACE {
            return Err(WriteError::ProtectedTopic(namespace.to_string()));
        }

        self.write_unchecked(namespace, data).await
    }

    /// Reads the committed entry at `index` of the topic's log through the leader. `None` while
    /// nothing is committed there.
    pub async fn read(&self, namespace: &str, index: Index) -> Result<Option<CommittedEntry>, ReadError> {
        let input = replica::ReadInput {
            namespace: namespace.to_string(),
            index,
        };

        self.actor_client.read(input).await
    }

    /// Proposes a new topic. Every node provisions it once the command commits.
    pub async fn create_topic(&self, namespace: &str) -> Result<WriteOutput, WriteError> {
        if namespace == CONTROL_NAMESPACE {
            return Err(WriteError::ProtectedTopic(namespace.to_string()));
        }

        self.propose(ControlCommand::create_topic(namespace)).await
    }

    pub async fn delete_topic(&self, namespace: &str) -> Result<WriteOutput, WriteError> {
        if namespace == CONTROL_NAMESPACE {
            return Err(WriteError::ProtectedTopic(namespace.to_string()));
        }

        self.propose(ControlCommand::DeleteTopic {
            namespace: namespace.to_string(),
        })
        .await
    }

    /// Commits of the topic from now on, or None if this node doesn't know the topic (yet).
    pub fn subscribe_commits(&self, namespace: &str) -> Option<CommitStream> {
        let topic = self.registry.get_by_namespace(namespace)?;
        let logger = self.logger.new(slog::o!("Topic" => namespace.to_string()));
        let mut log = replica::lock_log(topic.log());

        Some(replica::subscribe_commits(logger, &mut log))
    }

    pub fn topic(&self, namespace: &str) -> Option<Topic> {
        self.registry.get_by_namespace(namespace)
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.registry.topics()
    }

    pub fn topic_registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Leader as last announced through the committed control log.
    pub fn known_leader(&self) -> Option<NodeId> {
        self.known_leader.get()
    }

    pub fn event_listener(&self) -> RaftEventListener {
        self.event_listener.clone()
    }

    /// Stops the node: its current state is exited, which stops any election or replication it
    /// runs, and the event loop terminates. Calling it again returns `ActorExited`.
    pub async fn shutdown(&self) -> Result<(), ActorExited> {
        let control_consumer = self
            .control_consumer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let result = self.actor_client.shutdown().await;

        if let Some((cancel, join_handle)) = control_consumer {
            cancel.cancel();
            if let Err(e) = join_handle.await {
                slog::warn!(self.logger, "Control log consumer ended abnormally: {}", e);
            }
        }
        slog::info!(self.logger, "Node {} shut down", self.node_id);

        result
    }

    async fn propose(&self, command: ControlCommand) -> Result<WriteOutput, WriteError> {
        let data = command.encode().map_err(|e| WriteError::Encoding(e.to_string()))?;

        self.write_unchecked(CONTROL_NAMESPACE, data).await
    }

    async fn write_unchecked(&self, namespace: &str, data: Bytes) -> Result<WriteOutput, WriteError> {
        let input = replica::WriteInput {
            namespace: namespace.to_string(),
            data,
        };

        self.actor_client.write(input).await
    }
}

use crate::replica::control::{ControlCommand, ControlCommandError};
use crate::replica::topic::{TopicRegistry, CONTROL_NAMESPACE};
use crate::replica::write_ahead_log::{CommitStream, CommittedEntry};
use crate::replica::NodeId;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

/// Last leader announced through the control log.
#[derive(Clone, Default)]
pub struct KnownLeader {
    leader: Arc<RwLock<Option<NodeId>>>,
}

impl KnownLeader {
    pub fn get(&self) -> Option<NodeId> {
        self.leader
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, leader: NodeId) {
        self.leader
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(leader);
    }
}

/// ControlLogConsumer applies committed control commands to the topic directory and the known
/// leader pointer.
pub(crate) struct ControlLogConsumer {
    logger: slog::Logger,
    registry: TopicRegistry,
    known_leader: KnownLeader,
}

impl ControlLogConsumer {
    pub(crate) fn new(logger: slog::Logger, registry: TopicRegistry, known_leader: KnownLeader) -> Self {
        ControlLogConsumer {
            logger,
            registry,
            known_leader,
        }
    }

    pub(crate) fn consume(&self, entry: &CommittedEntry) -> Result<(), ControlCommandError> {
        let command = ControlCommand::decode(&entry.data)?;
        slog::debug!(self.logger, "Applying control command at {:?}: {:?}", entry.index, command);

        match command {
            ControlCommand::CreateTopic { id, namespace } => {
                self.registry.provision_topic(id, &namespace);
            }
            ControlCommand::DeleteTopic { namespace } => {
                if namespace == CONTROL_NAMESPACE {
                    return Err(ControlCommandError::ProtectedTopic(namespace));
                }
                if let Some(topic) = self.registry.get_by_namespace(&namespace) {
                    self.registry.remove(&topic);
                }
            }
            ControlCommand::ConsensusChange { leader_node } => {
                slog::info!(self.logger, "Leader is now {}", leader_node);
                self.known_leader.set(leader_node);
            }
        }

        Ok(())
    }

    /// Consumes `commits` until cancelled or the stream closes. A failing entry is logged and
    /// skipped.
    pub(crate) async fn run(self, mut commits: CommitStream, cancel: CancellationToken) {
        loop {
            let entry = tokio::select! {
                _ = cancel.cancelled() => return,
                opt_entry = commits.recv() => match opt_entry {
                    Some(entry) => entry,
                    None => return,
                },
            };

            if let Err(e) = self.consume(&entry) {
                slog::error!(self.logger, "Skipping control entry at {:?}: {}", entry.index, e);
            }
        }
    }
}

use crate::replica::topic::TopicId;
use crate::replica::NodeId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Administrative commands carried by the control topic. Every node applies them in commit order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    CreateTopic { id: TopicId, namespace: String },
    DeleteTopic { namespace: String },
    /// Appended by every new leader as the first entry of its term.
    ConsensusChange { leader_node: NodeId },
}

#[derive(Debug, thiserror::Error)]
pub enum ControlCommandError {
    #[error("Malformed control command: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Topic {0} can't be deleted")]
    ProtectedTopic(String),
}

impl ControlCommand {
    pub fn create_topic<S: Into<String>>(namespace: S) -> Self {
        ControlCommand::CreateTopic {
            id: TopicId::generate(),
            namespace: namespace.into(),
        }
    }

    pub fn consensus_change(leader_node: NodeId) -> Self {
        ControlCommand::ConsensusChange { leader_node }
    }

    pub fn encode(&self) -> Result<Bytes, ControlCommandError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(data: &[u8]) -> Result<Self, ControlCommandError> {
        Ok(serde_json::from_slice(data)?)
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

/// NodeId identifies one member of the cluster.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub address: SocketAddr,
}

impl Node {
    pub fn new(id: NodeId, address: SocketAddr) -> Self {
        Node { id, address }
    }
}

/// ClusterSet is the static membership view of the cluster from one node's perspective.
#[derive(Clone, Debug)]
pub struct ClusterSet {
    local_node: Node,
    peers: Vec<Node>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ClusterSetError {
    #[error("node {0} is not a cluster member")]
    LocalNodeMissing(NodeId),
    #[error("node {0} is listed more than once")]
    DuplicateNode(NodeId),
}

impl ClusterSet {
    pub fn try_new(local_node_id: &NodeId, members: Vec<Node>) -> Result<Self, ClusterSetError> {
        let mut seen = HashSet::with_capacity(members.len());
        for member in members.iter() {
            if !seen.insert(member.id.clone()) {
                return Err(ClusterSetError::DuplicateNode(member.id.clone()));
            }
        }

        let mut local_node = None;
        let mut peers = Vec::with_capacity(members.len().saturating_sub(1));
        for member in members {
            if &member.id == local_node_id {
                local_node = Some(member);
            } else {
                peers.push(member);
            }
        }

        let local_node = local_node.ok_or_else(|| ClusterSetError::LocalNodeMissing(local_node_id.clone()))?;

        Ok(ClusterSet { local_node, peers })
    }

    pub fn local_node(&self) -> &Node {
        &self.local_node
    }

    pub fn peers(&self) -> &[Node] {
        &self.peers
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::once(&self.local_node).chain(self.peers.iter())
    }

    pub fn num_nodes(&self) -> usize {
        self.peers.len() + 1
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.all_nodes().any(|n| &n.id == node_id)
    }

    pub fn majority(&self) -> usize {
        (self.num_nodes() / 2) + 1
    }
}

use crate::replica::NodeId;
use std::collections::HashMap;

/// ElectionTally counts the votes of one election attempt. Each node's vote is recorded at most
/// once.
#[derive(Debug)]
pub struct ElectionTally {
    total_nodes: usize,
    votes: HashMap<NodeId, bool>,
}

impl ElectionTally {
    pub fn new(total_nodes: usize) -> Self {
        ElectionTally {
            total_nodes,
            votes: HashMap::with_capacity(total_nodes),
        }
    }

    /// Returns false if `node` already voted.
    pub fn record_up_vote(&mut self, node: NodeId) -> bool {
        self.record(node, true)
    }

    /// Returns false if `node` already voted.
    pub fn record_down_vote(&mut self, node: NodeId) -> bool {
        self.record(node, false)
    }

    fn record(&mut self, node: NodeId, granted: bool) -> bool {
        if self.votes.contains_key(&node) {
            return false;
        }
        self.votes.insert(node, granted);
        true
    }

    pub fn total_nodes(&self) -> usize {
        self.total_nodes
    }

    pub fn up_votes(&self) -> usize {
        self.votes.values().filter(|granted| **granted).count()
    }

    pub fn down_votes(&self) -> usize {
        self.votes.values().filter(|granted| !**granted).count()
    }

    pub fn outstanding(&self) -> usize {
        self.total_nodes.saturating_sub(self.votes.len())
    }
}

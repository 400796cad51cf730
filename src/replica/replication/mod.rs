mod controller;
mod replicator;

pub(crate) use controller::LeaderContext;
pub(crate) use controller::ReplicationController;
pub(crate) use replicator::Replicator;

mod control;
mod election;
mod local_state;
mod messenger;
mod peers;
mod replica;
mod replica_api;
mod replica_wiring;
mod replication;
mod states;
mod topic;
mod write_ahead_log;

pub use control::ControlCommand;
pub use control::ControlCommandError;
pub use control::KnownLeader;
pub use election::ElectionStateChangeListener;
pub use election::ElectionStateSnapshot;
pub use election::ElectionStrategy;
pub use election::ElectionTally;
pub use election::MajorityElectionStrategy;
pub use local_state::Term;
pub use messenger::ClusterMessenger;
pub use messenger::DispatchOutcome;
pub use messenger::InProcessNetwork;
pub use peers::ClusterSet;
pub use peers::ClusterSetError;
pub use peers::Node;
pub use peers::NodeId;
pub use replica_api::AppendEntriesInput;
pub use replica_api::AppendEntriesOutput;
pub use replica_api::AppendEntriesRejection;
pub use replica_api::OpCategory;
pub use replica_api::ReadError;
pub use replica_api::RequestVoteInput;
pub use replica_api::RequestVoteOutput;
pub use replica_api::WriteError;
pub use replica_api::WriteOutput;
pub use states::StateKind;
pub use topic::Topic;
pub use topic::TopicEvent;
pub use topic::TopicId;
pub use topic::TopicListener;
pub use topic::TopicListenerId;
pub use topic::TopicRegistry;
pub use topic::CONTROL_NAMESPACE;
pub use write_ahead_log::CommitResult;
pub use write_ahead_log::CommitStream;
pub use write_ahead_log::CommittedEntry;
pub use write_ahead_log::LogChangeListener;
pub use write_ahead_log::LogEntry;
pub use write_ahead_log::LogError;
pub use write_ahead_log::LogListenerId;
pub use write_ahead_log::LogSnapshot;
pub use write_ahead_log::ObservedLog;
pub use write_ahead_log::ReplicatedLog;
pub use write_ahead_log::WriteAheadLog;

pub(crate) use control::ControlLogConsumer;
pub(crate) use replica::Replica;
pub(crate) use replica_api::{ReadInput, ReadOutput, WriteInput};
pub(crate) use replica_wiring::create_replica;
pub(crate) use replica_wiring::ReplicaConfig;
pub(crate) use states::ReplicaTimings;
pub(crate) use write_ahead_log::{lock_log, subscribe_commits};

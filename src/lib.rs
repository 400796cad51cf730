mod actor;
mod api;
mod commitlog;
mod replica;

pub use actor::ActorExited;
pub use api::NodeConfig;
pub use api::NodeCreationError;
pub use api::RaftElectionState;
pub use api::RaftEvent;
pub use api::RaftEventListener;
pub use api::RaftNode;
pub use api::RaftOptions;
pub use api::try_create_node;
pub use commitlog::Entry;
pub use commitlog::InMemoryLog;
pub use commitlog::Index;
pub use commitlog::Log;
pub use replica::AppendEntriesInput;
pub use replica::AppendEntriesOutput;
pub use replica::AppendEntriesRejection;
pub use replica::CONTROL_NAMESPACE;
pub use replica::ClusterMessenger;
pub use replica::ClusterSet;
pub use replica::ClusterSetError;
pub use replica::CommitResult;
pub use replica::CommitStream;
pub use replica::CommittedEntry;
pub use replica::ControlCommand;
pub use replica::ControlCommandError;
pub use replica::DispatchOutcome;
pub use replica::ElectionStateChangeListener;
pub use replica::ElectionStateSnapshot;
pub use replica::ElectionStrategy;
pub use replica::ElectionTally;
pub use replica::InProcessNetwork;
pub use replica::KnownLeader;
pub use replica::LogChangeListener;
pub use replica::LogEntry;
pub use replica::LogError;
pub use replica::LogListenerId;
pub use replica::LogSnapshot;
pub use replica::MajorityElectionStrategy;
pub use replica::Node;
pub use replica::NodeId;
pub use replica::ObservedLog;
pub use replica::OpCategory;
pub use replica::ReadError;
pub use replica::ReplicatedLog;
pub use replica::RequestVoteInput;
pub use replica::RequestVoteOutput;
pub use replica::StateKind;
pub use replica::Term;
pub use replica::Topic;
pub use replica::TopicEvent;
pub use replica::TopicId;
pub use replica::TopicListener;
pub use replica::TopicListenerId;
pub use replica::TopicRegistry;
pub use replica::WriteAheadLog;
pub use replica::WriteError;
pub use replica::WriteOutput;

// Learning 1: `create::{root_mod}` should not have any code. Just `mod` and `pub use` statements.
// Learning 2: All `mod` statements, anywhere, should not be `pub`. Only export `pub` via individual
//             use statements.
//
// This keeps the `crate::{root_mod}` root_mod only responsible for exporting types to the rest of
// crate, and allows me to organize my root_mod impl however I want.

mod in_process;
mod messenger;

pub use in_process::InProcessNetwork;
pub use messenger::ClusterMessenger;
pub use messenger::DispatchOutcome;

pub(crate) use messenger::with_timeout;

mod command;
mod consumer;

pub use command::ControlCommand;
pub use command::ControlCommandError;
pub use consumer::KnownLeader;

pub(crate) use consumer::ControlLogConsumer;

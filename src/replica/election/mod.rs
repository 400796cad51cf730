mod scheduler;
mod state_change_listener;
mod strategy;
mod tally;
mod timers;

pub use state_change_listener::ElectionStateChangeListener;
pub use state_change_listener::ElectionStateSnapshot;
pub use strategy::ElectionStrategy;
pub use strategy::MajorityElectionStrategy;
pub use tally::ElectionTally;

pub(crate) use scheduler::ElectionCallbacks;
pub(crate) use scheduler::ElectionScheduler;
pub(crate) use scheduler::ElectionSchedulerConfig;
pub(crate) use state_change_listener::new as state_change_channel;
pub(crate) use state_change_listener::ElectionStateChangeNotifier;
pub(crate) use timers::Clock;
pub(crate) use timers::ElectionTimerHandle;
pub(crate) use timers::RealClock;

#[cfg(test)]
pub(crate) use timers::mocked_clock;

use crate::replica::ReplicaTimings;
use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct RaftOptions {
    pub broadcast_interval: Option<Duration>,
    pub election_min_timeout: Option<Duration>,
    pub election_max_timeout: Option<Duration>,
    pub rpc_timeout: Option<Duration>,
    pub max_entries_per_append: Option<usize>,
}

#[derive(Debug)]
pub(super) struct RaftOptionsValidated {
    pub broadcast_interval: Duration,
    pub election_min_timeout: Duration,
    pub election_max_timeout: Duration,
    pub rpc_timeout: Duration,
    pub max_entries_per_append: usize,
}

impl RaftOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.broadcast_interval >= self.election_min_timeout {
            return Err("Election minimum timeout must be greater than leader's broadcast interval");
        }
        if self.election_min_timeout >= self.election_max_timeout {
            return Err("Election minimum timeout must be less than maximum timeout");
        }
        if self.rpc_timeout >= self.election_min_timeout {
            return Err("RPC timeout must be less than the election minimum timeout");
        }
        if self.max_entries_per_append == 0 {
            return Err("Max entries per AppendEntries must be positive");
        }

        Ok(())
    }

    pub(super) fn timings(&self) -> ReplicaTimings {
        ReplicaTimings {
            broadcast_interval: self.broadcast_interval,
            election_min_timeout: self.election_min_timeout,
            election_max_timeout: self.election_max_timeout,
            rpc_timeout: self.rpc_timeout,
            max_entries_per_append: self.max_entries_per_append,
        }
    }
}

impl TryFrom<RaftOptions> for RaftOptionsValidated {
    type Error = &'static str;

    fn try_from(options: RaftOptions) -> Result<Self, Self::Error> {
        let values = RaftOptionsValidated {
            broadcast_interval: options.broadcast_interval.unwrap_or(Duration::from_millis(50)),
            election_min_timeout: options.election_min_timeout.unwrap_or(Duration::from_millis(300)),
            election_max_timeout: options.election_max_timeout.unwrap_or(Duration::from_millis(600)),
            rpc_timeout: options.rpc_timeout.unwrap_or(Duration::from_millis(100)),
            max_entries_per_append: options.max_entries_per_append.unwrap_or(128),
        };

        values.validate()?;
        Ok(values)
    }
}

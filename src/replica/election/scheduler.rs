use crate::replica::election::{ElectionStrategy, ElectionTally};
use crate::replica::messenger::{with_timeout, ClusterMessenger, DispatchOutcome};
use crate::replica::peers::{Node, NodeId};
use crate::replica::replica_api::RequestVoteInput;
use crate::replica::Term;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;
use tokio::time::Duration;

/// What to do once an election attempt is decided. Exactly one of `on_success`/`on_failure` runs,
/// at most once. Callbacks run on whichever task recorded the deciding vote, so they must not
/// block.
pub(crate) struct ElectionCallbacks {
    pub(crate) on_success: Box<dyn FnOnce() + Send>,
    pub(crate) on_failure: Box<dyn FnOnce() + Send>,
    /// A voter answered with a newer term than the election's.
    pub(crate) on_higher_term: Box<dyn Fn(Term) + Send + Sync>,
}

/// ElectionScheduler runs one election attempt for one term: a vote for ourselves, then a
/// concurrent RequestVote to every peer, each bounded by its own timeout.
pub(crate) struct ElectionScheduler {
    logger: slog::Logger,
    my_node_id: NodeId,
    peers: Vec<Node>,
    messenger: Arc<dyn ClusterMessenger>,
    rpc_timeout: Duration,
    request: RequestVoteInput,
    progress: Arc<Mutex<ElectionProgress>>,
    dispatches: JoinSet<()>,
    scheduled: bool,
}

struct ElectionProgress {
    tally: ElectionTally,
    strategy: Box<dyn ElectionStrategy>,
    finished: bool,
    callbacks: Option<ElectionCallbacks>,
}

pub(crate) struct ElectionSchedulerConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) my_node_id: NodeId,
    pub(crate) peers: Vec<Node>,
    pub(crate) messenger: Arc<dyn ClusterMessenger>,
    pub(crate) rpc_timeout: Duration,
    pub(crate) strategy: Box<dyn ElectionStrategy>,
}

impl ElectionScheduler {
    pub(crate) fn new(config: ElectionSchedulerConfig, request: RequestVoteInput, callbacks: ElectionCallbacks) -> Self {
        let total_nodes = config.peers.len() + 1;

        ElectionScheduler {
            logger: config.logger,
            my_node_id: config.my_node_id,
            peers: config.peers,
            messenger: config.messenger,
            rpc_timeout: config.rpc_timeout,
            request,
            progress: Arc::new(Mutex::new(ElectionProgress {
                tally: ElectionTally::new(total_nodes),
                strategy: config.strategy,
                finished: false,
                callbacks: Some(callbacks),
            })),
            dispatches: JoinSet::new(),
            scheduled: false,
        }
    }

    pub(crate) fn term(&self) -> Term {
        self.request.candidate_term
    }

    /// Starts the election. Calling it again has no effect.
    pub(crate) fn schedule(&mut self) {
        if self.scheduled {
            return;
        }
        self.scheduled = true;

        slog::info!(self.logger, "Starting election for term {:?}", self.term());
        record_vote(&self.logger, &self.progress, self.my_node_id.clone(), true);

        for peer in self.peers.iter() {
            let logger = self.logger.new(slog::o!("Peer" => peer.id.to_string()));
            let peer = peer.clone();
            let messenger = self.messenger.clone();
            let request = self.request.clone();
            let rpc_timeout = self.rpc_timeout;
            let progress = self.progress.clone();

            self.dispatches.spawn(async move {
                let term = request.candidate_term;
                slog::debug!(logger, "ClientWire - {:?}", request);
                let outcome = with_timeout(rpc_timeout, messenger.request_vote(&peer, request)).await;
                slog::debug!(logger, "ClientWire - {:?}", outcome);

                match outcome {
                    DispatchOutcome::Succeeded(output) => {
                        if output.term > term {
                            notify_higher_term(&progress, output.term);
                            record_vote(&logger, &progress, peer.id, false);
                        } else {
                            record_vote(&logger, &progress, peer.id, output.vote_granted);
                        }
                    }
                    DispatchOutcome::TimedOut => {
                        slog::warn!(logger, "RequestVote timed out, not counting a vote");
                    }
                    DispatchOutcome::TransportError(e) => {
                        slog::warn!(logger, "RequestVote failed, not counting a vote: {}", e);
                    }
                }
            });
        }
    }

    /// Abandons the election without running any callback. Idempotent.
    pub(crate) fn finish(&self) {
        let mut progress = lock(&self.progress);
        progress.finished = true;
        progress.callbacks.take();
    }

    /// Finishes the election and waits until no dispatch is running anymore.
    pub(crate) async fn shutdown(&mut self) {
        self.finish();
        self.dispatches.shutdown().await;
    }

    #[cfg(test)]
    async fn wait_for_dispatches(&mut self) {
        while self.dispatches.join_next().await.is_some() {}
    }
}

fn lock(progress: &Mutex<ElectionProgress>) -> MutexGuard<'_, ElectionProgress> {
    progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn record_vote(logger: &slog::Logger, progress: &Mutex<ElectionProgress>, node: NodeId, granted: bool) {
    let callback = {
        let mut progress = lock(progress);
        if progress.finished {
            return;
        }

        let recorded = if granted {
            progress.tally.record_up_vote(node)
        } else {
            progress.tally.record_down_vote(node)
        };
        if !recorded || !progress.strategy.is_complete(&progress.tally) {
            return;
        }

        progress.finished = true;
        let successful = progress.strategy.is_successful(&progress.tally);
        slog::info!(
            logger,
            "Election decided. Won: {}, votes: {}/{}",
            successful,
            progress.tally.up_votes(),
            progress.tally.total_nodes()
        );

        match progress.callbacks.take() {
            Some(callbacks) if successful => callbacks.on_success,
            Some(callbacks) => callbacks.on_failure,
            None => return,
        }
    };

    callback();
}

fn notify_higher_term(progress: &Mutex<ElectionProgress>, term: Term) {
    let progress = lock(progress);
    if let Some(callbacks) = progress.callbacks.as_ref() {
        (callbacks.on_higher_term)(term);
    }
}

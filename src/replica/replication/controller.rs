use crate::actor::WeakActorClient;
use crate::commitlog::Index;
use crate::replica::election::Clock;
use crate::replica::messenger::{with_timeout, ClusterMessenger, DispatchOutcome};
use crate::replica::peers::{Node, NodeId};
use crate::replica::replica_api::{AppendEntriesInput, AppendEntriesOutput, AppendEntriesRejection};
use crate::replica::topic::Topic;
use crate::replica::write_ahead_log::{lock_log, LogError, ReplicatedLog};
use crate::replica::Term;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything a leader's replication controllers share for one leadership term.
pub(crate) struct LeaderContext {
    pub(crate) logger: slog::Logger,
    pub(crate) term: Term,
    pub(crate) my_node_id: NodeId,
    pub(crate) peers: Vec<Node>,
    pub(crate) messenger: Arc<dyn ClusterMessenger>,
    pub(crate) broadcast_interval: Duration,
    pub(crate) rpc_timeout: Duration,
    pub(crate) max_entries_per_append: usize,
    pub(crate) actor_client: WeakActorClient,
}

/// ReplicationController ships one topic's log to every follower on a fixed interval, and
/// advances the topic's commit index once a majority has an entry of the current term.
pub(crate) struct ReplicationController<C: Clock> {
    logger: slog::Logger,
    ctx: Arc<LeaderContext>,
    topic: Topic,
    clock: C,
    cancel: CancellationToken,
    followers: HashMap<NodeId, FollowerProgress>,
    stepping_down: bool,
}

struct FollowerProgress {
    node: Node,
    // > index of highest log entry known to be replicated on server
    // > (initialized to 0, increases monotonically)
    matched: Index,
    // Simplicity vs throughput tradeoff. We allow 1 outstanding request per follower; no
    // pipelining. Entries are still batched.
    in_flight: bool,
}

type Reply = (NodeId, DispatchOutcome<AppendEntriesOutput>);

impl<C: Clock + Send + Sync + 'static> ReplicationController<C> {
    pub(crate) fn new(ctx: Arc<LeaderContext>, topic: Topic, clock: C, cancel: CancellationToken) -> Self {
        let logger = ctx.logger.new(slog::o!("Topic" => topic.namespace().to_string()));
        let followers = ctx
            .peers
            .iter()
            .map(|node| {
                (
                    node.id.clone(),
                    FollowerProgress {
                        node: node.clone(),
                        matched: Index::zero(),
                        in_flight: false,
                    },
                )
            })
            .collect();

        ReplicationController {
            logger,
            ctx,
            topic,
            clock,
            cancel,
            followers,
            stepping_down: false,
        }
    }

    /// Runs until cancelled. In-flight dispatches are aborted and awaited before returning.
    pub(crate) async fn run(mut self) {
        slog::debug!(self.logger, "Replication controller started for term {:?}", self.ctx.term);
        let mut in_flight: JoinSet<Reply> = JoinSet::new();
        let mut next_tick = self.clock.now();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => match joined {
                    Ok((peer_id, outcome)) => self.handle_reply(peer_id, outcome),
                    Err(e) => slog::warn!(self.logger, "AppendEntries dispatch task failed: {}", e),
                },
                _ = self.clock.sleep_until(next_tick) => {
                    next_tick = self.clock.now() + self.ctx.broadcast_interval;
                    self.broadcast(&mut in_flight);
                    self.advance_commit_index();
                }
            }
        }

        in_flight.shutdown().await;
        slog::debug!(self.logger, "Replication controller stopped");
    }

    fn broadcast(&mut self, in_flight: &mut JoinSet<Reply>) {
        if self.stepping_down {
            return;
        }

        for progress in self.followers.values_mut() {
            if progress.in_flight {
                continue;
            }

            let request = match build_request(&self.ctx, &self.topic, progress.matched) {
                Ok(request) => request,
                Err(e) => {
                    slog::error!(self.logger, "Failed to read log for {}: {}", progress.node.id, e);
                    continue;
                }
            };
            progress.in_flight = true;

            let logger = self.logger.new(slog::o!("Peer" => progress.node.id.to_string()));
            let messenger = self.ctx.messenger.clone();
            let rpc_timeout = self.ctx.rpc_timeout;
            let node = progress.node.clone();
            in_flight.spawn(async move {
                slog::debug!(logger, "ClientWire - {:?}", request);
                let outcome = with_timeout(rpc_timeout, messenger.append_entries(&node, request)).await;
                slog::debug!(logger, "ClientWire - {:?}", outcome);

                (node.id, outcome)
            });
        }
    }

    fn handle_reply(&mut self, peer_id: NodeId, outcome: DispatchOutcome<AppendEntriesOutput>) {
        let progress = match self.followers.get_mut(&peer_id) {
            Some(progress) => progress,
            None => {
                slog::warn!(self.logger, "Reply from unknown peer {}", peer_id);
                return;
            }
        };
        progress.in_flight = false;

        let output = match outcome {
            DispatchOutcome::Succeeded(output) => output,
            DispatchOutcome::TimedOut => {
                slog::debug!(self.logger, "AppendEntries to {} timed out", peer_id);
                return;
            }
            DispatchOutcome::TransportError(e) => {
                slog::debug!(self.logger, "AppendEntries to {} failed: {}", peer_id, e);
                return;
            }
        };

        if output.term > self.ctx.term {
            slog::warn!(
                self.logger,
                "Peer {} is on newer term {:?}, stepping down",
                peer_id,
                output.term
            );
            self.stepping_down = true;
            // Spawned, because the actor may be busy awaiting this very controller's shutdown.
            let actor_client = self.ctx.actor_client.clone();
            let newer_term = output.term;
            tokio::spawn(async move { actor_client.higher_term_observed(newer_term).await });
            return;
        }

        match output.result {
            Ok(match_index) => {
                if match_index > progress.matched {
                    progress.matched = match_index;
                }
                self.advance_commit_index();
            }
            Err(AppendEntriesRejection::UnknownTopic) => {
                // Follower hasn't applied the CREATE_TOPIC yet. Next tick retries.
                slog::debug!(self.logger, "Peer {} doesn't know the topic yet", peer_id);
            }
            Err(rejection) => {
                slog::warn!(self.logger, "AppendEntries rejected by {}: {}", peer_id, rejection);
            }
        }
    }

    fn advance_commit_index(&mut self) {
        let peers_matched = self.followers.values().map(|progress| progress.matched).collect();

        let mut log = lock_log(self.topic.log());
        let tentative_commit_index = std::cmp::min(
            get_cluster_commit_index(log.last_index(), peers_matched),
            log.last_index(),
        );
        if tentative_commit_index <= log.commit_index() {
            return;
        }

        // > If there exists an N such that N > commitIndex, a majority
        // > of matchIndex[i] ≥ N, and log[N].term == currentTerm:
        // > set commitIndex = N (§5.3, §5.4).
        match log.read(tentative_commit_index) {
            Ok(Some(entry)) if entry.term == self.ctx.term => {
                if let Err(e) = log.commit(tentative_commit_index) {
                    slog::error!(self.logger, "Failed to commit {:?}: {}", tentative_commit_index, e);
                }
            }
            Ok(_) => {}
            Err(e) => slog::error!(self.logger, "Failed to read {:?}: {}", tentative_commit_index, e),
        }
    }
}

/// AppendEntries for a follower that's known to match us up to `matched`.
fn build_request(ctx: &LeaderContext, topic: &Topic, matched: Index) -> Result<AppendEntriesInput, LogError> {
    let log = lock_log(topic.log());

    let leader_previous_log_entry = log.read(matched)?.map(|entry| (entry.term, matched));
    let snapshot = log.read_snapshot(matched.plus(1), matched.plus(ctx.max_entries_per_append as u64))?;

    Ok(AppendEntriesInput {
        leader_term: ctx.term,
        leader_id: ctx.my_node_id.clone(),
        topic_id: topic.id().clone(),
        leader_previous_log_entry,
        leader_commit_index: snapshot.commit_index,
        new_entries: snapshot.entries,
    })
}

/// Highest index replicated on a majority, counting the leader at `leader_last_index`.
fn get_cluster_commit_index(leader_last_index: Index, mut peers_matched_indexes: Vec<Index>) -> Index {
    if peers_matched_indexes.is_empty() {
        return leader_last_index;
    }
    peers_matched_indexes.sort();

    // Overview of why algo is correct:
    // We are always at the tail of the array, because our log is same/longest.
    // 1. add "me"
    //let cluster_size = peers_matched_indexes.len() + 1;
    // 2. calculate majority
    //let majority = (cluster_size / 2) + 1;
    // 3. subtract "me"
    //let num_peers_to_achieve_majority = majority - 1;
    // 4. take `i`th index from the right
    //let quorum_idx = peers_matched_indexes.len() - num_peers_to_achieve_majority;

    // Or just use this simplified equation which is harder to understand at a glance why it
    // works. When in doubt, just read the unit tests.
    let quorum_idx = peers_matched_indexes.len() / 2;

    peers_matched_indexes.remove(quorum_idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorClient;
    use crate::replica::election::mocked_clock;
    use crate::replica::replica_api::{RequestVoteInput, RequestVoteOutput};
    use crate::replica::topic::{TopicId, TopicRegistry};
    use crate::replica::write_ahead_log::LogEntry;
    use bytes::Bytes;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_commit_checker_logic() {
        fn run(expected: u64, matches: Vec<u64>) {
            let matches = matches.into_iter().map(Index::new).collect();

            assert_eq!(Index::new(expected), get_cluster_commit_index(Index::new(10), matches));
        }

        // 1-cluster
        run(10, vec![]);

        // 3-cluster
        run(0, vec![0, 0]);
        run(9, vec![0, 9]);
        run(9, vec![8, 9]);

        // 4-cluster
        run(0, vec![0, 0, 0]);
        run(0, vec![0, 0, 9]);
        run(8, vec![0, 8, 9]);
        run(8, vec![7, 8, 9]);

        // 5-cluster
        run(0, vec![0, 0, 0, 0]);
        run(0, vec![0, 0, 0, 9]);
        run(8, vec![0, 0, 8, 9]);
        run(8, vec![0, 7, 8, 9]);
        run(8, vec![6, 7, 8, 9]);

        // 6-cluster
        run(0, vec![0, 0, 0, 0, 0]);
        run(0, vec![0, 0, 0, 0, 9]);
        run(0, vec![0, 0, 0, 8, 9]);
        run(7, vec![0, 0, 7, 8, 9]);
        run(7, vec![0, 6, 7, 8, 9]);
        run(7, vec![5, 6, 7, 8, 9]);

        // Ordering doesn't matter
        run(9, vec![9, 8]);
        run(8, vec![7, 9, 8]);
        run(8, vec![6, 0, 8, 9]);
        run(7, vec![9, 8, 0, 0, 7]);
    }

    /// peer-0 acknowledges everything it's sent, every other peer is unreachable.
    struct OneHealthyPeer {
        term: Term,
        dispatches: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ClusterMessenger for OneHealthyPeer {
        async fn append_entries(&self, node: &Node, input: AppendEntriesInput) -> DispatchOutcome<AppendEntriesOutput> {
            self.dispatches.fetch_add(1, Ordering::SeqCst);
            if node.id != NodeId::new("peer-0") {
                return DispatchOutcome::TransportError("unreachable".into());
            }

            let match_index = input.previous_log_index().plus(input.new_entries.len() as u64);
            DispatchOutcome::Succeeded(AppendEntriesOutput {
                term: self.term,
                result: Ok(match_index),
            })
        }

        async fn request_vote(&self, _: &Node, _: RequestVoteInput) -> DispatchOutcome<RequestVoteOutput> {
            unimplemented!()
        }
    }

    fn leader_context(
        term: u64,
        num_peers: usize,
        messenger: Arc<dyn ClusterMessenger>,
        actor_client: &ActorClient,
    ) -> Arc<LeaderContext> {
        Arc::new(LeaderContext {
            logger: slog::Logger::root(slog::Discard, slog::o!()),
            term: Term::new(term),
            my_node_id: NodeId::new("me"),
            peers: (0..num_peers)
                .map(|i| {
                    Node::new(
                        NodeId::new(format!("peer-{}", i)),
                        SocketAddr::from(([127, 0, 0, 1], 9000 + i as u16)),
                    )
                })
                .collect(),
            messenger,
            broadcast_interval: Duration::from_millis(50),
            rpc_timeout: Duration::from_millis(20),
            max_entries_per_append: 2,
            actor_client: actor_client.weak(),
        })
    }

    fn topic_with_entries(terms: &[u64]) -> Topic {
        let registry = TopicRegistry::new(slog::Logger::root(slog::Discard, slog::o!()));
        let topic = registry.provision_topic(TopicId::new("t"), "orders");
        {
            let mut log = topic.log().lock().unwrap();
            for term in terms {
                log.append(LogEntry::new(Term::new(*term), Bytes::from_static(b"x")))
                    .unwrap();
            }
        }
        topic
    }

    fn commit_index(topic: &Topic) -> Index {
        topic.log().lock().unwrap().commit_index()
    }

    async fn wait_for_commit_index(topic: &Topic, expected: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while commit_index(topic) != Index::new(expected) {
            assert!(tokio::time::Instant::now() < deadline, "commit index stuck at {:?}", commit_index(topic));
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn commits_on_majority_in_batches() {
        let (actor_client, _rx) = ActorClient::new(10);
        let messenger = Arc::new(OneHealthyPeer {
            term: Term::new(2),
            dispatches: AtomicUsize::new(0),
        });
        let ctx = leader_context(2, 2, messenger, &actor_client);
        let topic = topic_with_entries(&[2, 2, 2]);
        let (clock, mut clock_controller) = mocked_clock();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(ReplicationController::new(ctx, topic.clone(), clock, cancel.clone()).run());

        // First tick is immediate and carries 2 entries.
        wait_for_commit_index(&topic, 2).await;

        clock_controller.advance(Duration::from_millis(50));
        wait_for_commit_index(&topic, 3).await;

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn never_commits_older_term_entries_on_their_own() {
        let (actor_client, _rx) = ActorClient::new(10);
        let messenger = Arc::new(OneHealthyPeer {
            term: Term::new(3),
            dispatches: AtomicUsize::new(0),
        });
        let ctx = leader_context(3, 2, messenger.clone(), &actor_client);
        let topic = topic_with_entries(&[1, 2]);
        let (clock, mut clock_controller) = mocked_clock();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(ReplicationController::new(ctx, topic.clone(), clock, cancel.clone()).run());

        for _ in 0..3 {
            clock_controller.advance(Duration::from_millis(50));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(commit_index(&topic), Index::zero());
        assert!(messenger.dispatches.load(Ordering::SeqCst) > 0);

        topic
            .log()
            .lock()
            .unwrap()
            .append(LogEntry::new(Term::new(3), Bytes::from_static(b"x")))
            .unwrap();
        clock_controller.advance(Duration::from_millis(50));
        wait_for_commit_index(&topic, 3).await;

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn newer_term_reply_notifies_actor() {
        let (actor_client, mut rx) = ActorClient::new(10);
        let messenger = Arc::new(OneHealthyPeer {
            term: Term::new(9),
            dispatches: AtomicUsize::new(0),
        });
        let ctx = leader_context(2, 2, messenger, &actor_client);
        let topic = topic_with_entries(&[2]);
        let (clock, _clock_controller) = mocked_clock();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(ReplicationController::new(ctx, topic.clone(), clock, cancel.clone()).run());

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(event, crate::actor::Event::HigherTermObserved(term) if term == Term::new(9)));
        assert_eq!(commit_index(&topic), Index::zero());

        cancel.cancel();
        task.await.unwrap();
    }
}

use crate::replica::replica_api::{
    AppendEntriesInput, AppendEntriesOutput, AppendEntriesRejection, OpCategory, ReadError, ReadInput, ReadOutput,
    RequestVoteInput, RequestVoteOutput, WriteError, WriteInput, WriteOutput,
};
use crate::replica::states::{
    self, find_rule, NodeContext, RaftState, RequestKind, StateKind, TransitionRule, TransitionTrigger,
};
use crate::replica::peers::NodeId;
use crate::replica::write_ahead_log::{lock_log, CommittedEntry, LogEntry, ReplicatedLog};
use crate::replica::Term;

/// Replica is one node's raft state machine: the current role plus everything that survives role
/// changes. It is driven exclusively by the node's actor.
pub(crate) struct Replica {
    ctx: NodeContext,
    state: Box<dyn RaftState>,
    rules: Vec<TransitionRule>,
    stopped: bool,
}

impl Replica {
    pub(crate) fn new(ctx: NodeContext, rules: Vec<TransitionRule>) -> Self {
        Replica {
            ctx,
            state: states::new_state(StateKind::Follower),
            rules,
            stopped: false,
        }
    }

    /// Every node starts as follower.
    pub(crate) fn initialize(&mut self) {
        self.state.on_enter(&mut self.ctx);
        self.ctx.publish_state(self.state.kind());
        slog::info!(self.ctx.logger, "Started as {:?} in term {:?}", self.state.kind(), self.ctx.current_term());
    }

    pub(crate) async fn handle_append_entries(&mut self, input: AppendEntriesInput) -> AppendEntriesOutput {
        // Ensure leader is known member.
        if !self.ctx.cluster.contains(&input.leader_id) {
            return AppendEntriesOutput {
                term: self.ctx.current_term(),
                result: Err(AppendEntriesRejection::ClientNotInCluster),
            };
        }

        self.apply_transition_rules(RequestKind::AppendEntries, input.leader_term)
            .await;
        self.state.handle_append_entries(&mut self.ctx, input)
    }

    pub(crate) async fn handle_request_vote(&mut self, input: RequestVoteInput) -> RequestVoteOutput {
        // Ensure candidate is known member.
        if !self.ctx.cluster.contains(&input.candidate_id) {
            slog::warn!(self.ctx.logger, "Not granting vote to unknown node {}", input.candidate_id);
            return RequestVoteOutput {
                term: self.ctx.current_term(),
                vote_granted: false,
            };
        }

        self.apply_transition_rules(RequestKind::RequestVote, input.candidate_term)
            .await;
        self.state.handle_request_vote(&mut self.ctx, input)
    }

    pub(crate) fn handle_write(&mut self, input: WriteInput) -> Result<WriteOutput, WriteError> {
        if let Err(known_leader) = self.serves(OpCategory::Write) {
            return Err(WriteError::NotLeader { known_leader });
        }

        let topic = self
            .ctx
            .registry
            .get_by_namespace(&input.namespace)
            .ok_or_else(|| WriteError::UnknownTopic(input.namespace.clone()))?;

        // > If command received from client: append entry to local log,
        // > respond after entry applied to state machine (§5.3)
        // Committing is reported through the topic's commit stream instead.
        let term = self.ctx.current_term();
        let index = lock_log(topic.log()).append(LogEntry::new(term, input.data))?;

        Ok(WriteOutput { term, index })
    }

    /// Reads a committed entry. Only the leader serves reads.
    pub(crate) fn handle_read(&self, input: ReadInput) -> Result<ReadOutput, ReadError> {
        if let Err(known_leader) = self.serves(OpCategory::Read) {
            return Err(ReadError::NotLeader { known_leader });
        }

        let topic = self
            .ctx
            .registry
            .get_by_namespace(&input.namespace)
            .ok_or_else(|| ReadError::UnknownTopic(input.namespace.clone()))?;

        let log = lock_log(topic.log());
        if input.index.is_zero() || input.index > log.commit_index() {
            return Ok(None);
        }

        Ok(log.read(input.index)?.map(|entry| CommittedEntry {
            term: entry.term,
            index: input.index,
            data: entry.data,
        }))
    }

    // On refusal, returns where the client should go instead.
    fn serves(&self, op: OpCategory) -> Result<(), Option<NodeId>> {
        if self.state.supported_ops().contains(&op) {
            return Ok(());
        }

        Err(self
            .state
            .known_leader(&self.ctx)
            .or_else(|| self.ctx.known_leader.get()))
    }

    pub(crate) async fn handle_election_timeout(&mut self, term: Term) {
        let current_term = self.ctx.current_term();
        if term != current_term {
            slog::debug!(
                self.ctx.logger,
                "Discarding election timeout of term {:?}, current term is {:?}",
                term,
                current_term
            );
            return;
        }

        match self.state.kind() {
            StateKind::Leader => {}
            StateKind::Follower | StateKind::Candidate => {
                slog::info!(self.ctx.logger, "Election timeout in term {:?}", term);
                self.transition(StateKind::Candidate, None).await;
            }
        }
    }

    pub(crate) async fn handle_election_outcome(&mut self, term: Term, won: bool) {
        if self.state.kind() != StateKind::Candidate || term != self.ctx.current_term() {
            slog::debug!(self.ctx.logger, "Discarding outcome of election for term {:?}", term);
            return;
        }

        if won {
            self.transition(StateKind::Leader, None).await;
        } else {
            self.transition(StateKind::Follower, None).await;
        }
    }

    pub(crate) async fn handle_higher_term_observed(&mut self, term: Term) {
        self.apply_transition_rules(RequestKind::Reply, term).await;
    }

    /// Leaves the current state for good. Idempotent.
    pub(crate) async fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.state.on_exit(&mut self.ctx).await;
    }

    async fn apply_transition_rules(&mut self, request: RequestKind, request_term: Term) {
        let trigger = TransitionTrigger {
            state: self.state.kind(),
            current_term: self.ctx.current_term(),
            request,
            request_term,
        };

        if let Some(rule) = find_rule(&self.rules, &trigger).copied() {
            slog::info!(
                self.ctx.logger,
                "Rule {} matched {:?} of term {:?}, moving to {:?}",
                rule.name,
                request,
                request_term,
                rule.target
            );
            self.transition(rule.target, Some((rule, trigger))).await;
        }
    }

    async fn transition(&mut self, target: StateKind, rule: Option<(TransitionRule, TransitionTrigger)>) {
        self.state.on_exit(&mut self.ctx).await;

        if let Some((TransitionRule { pre_hook: Some(pre_hook), .. }, trigger)) = &rule {
            pre_hook(&mut self.ctx, trigger);
        }

        self.state = states::new_state(target);
        self.state.on_enter(&mut self.ctx);

        if let Some((TransitionRule { post_hook: Some(post_hook), .. }, trigger)) = &rule {
            post_hook(&mut self.ctx, trigger);
        }

        self.ctx.publish_state(target);
    }
}

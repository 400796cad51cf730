use crate::replica::election::{
    ElectionCallbacks, ElectionScheduler, ElectionSchedulerConfig, ElectionTimerHandle, MajorityElectionStrategy,
};
use crate::replica::replica_api::{
    AppendEntriesInput, AppendEntriesOutput, AppendEntriesRejection, OpCategory, RequestVoteInput,
    RequestVoteOutput,
};
use crate::replica::states::{NodeContext, RaftState, StateKind};

pub(super) struct CandidateState {
    // Bounds the election. If it fires before a decision, the actor starts a new election.
    timer: Option<ElectionTimerHandle>,
    election: Option<ElectionScheduler>,
}

impl CandidateState {
    pub(super) fn new() -> Self {
        CandidateState {
            timer: None,
            election: None,
        }
    }
}

#[async_trait::async_trait]
impl RaftState for CandidateState {
    fn kind(&self) -> StateKind {
        StateKind::Candidate
    }

    fn supported_ops(&self) -> &'static [OpCategory] {
        &[]
    }

    fn on_enter(&mut self, ctx: &mut NodeContext) {
        // > On conversion to candidate, start election:
        // > • Increment currentTerm
        // > • Vote for self
        // > • Reset election timer
        // > • Send RequestVote RPCs to all other servers
        let term = ctx.local_state.increment_term_and_vote_for_self();
        self.timer = Some(ElectionTimerHandle::spawn_timer_task(
            ctx.timings.election_min_timeout,
            ctx.timings.election_max_timeout,
            ctx.actor_client.clone(),
            term,
        ));

        let request = RequestVoteInput {
            candidate_term: term,
            candidate_id: ctx.my_node_id().clone(),
            candidate_last_log_entries: ctx.last_log_entries(),
        };

        let on_success_client = ctx.actor_client.clone();
        let on_failure_client = ctx.actor_client.clone();
        let on_higher_term_client = ctx.actor_client.clone();
        let callbacks = ElectionCallbacks {
            on_success: Box::new(move || {
                tokio::spawn(async move { on_success_client.election_outcome(term, true).await });
            }),
            on_failure: Box::new(move || {
                tokio::spawn(async move { on_failure_client.election_outcome(term, false).await });
            }),
            on_higher_term: Box::new(move |new_term| {
                let actor_client = on_higher_term_client.clone();
                tokio::spawn(async move { actor_client.higher_term_observed(new_term).await });
            }),
        };

        let mut election = ElectionScheduler::new(
            ElectionSchedulerConfig {
                logger: ctx.logger.new(slog::o!("Term" => term.as_u64())),
                my_node_id: ctx.my_node_id().clone(),
                peers: ctx.cluster.peers().to_vec(),
                messenger: ctx.messenger.clone(),
                rpc_timeout: ctx.timings.rpc_timeout,
                strategy: Box::new(MajorityElectionStrategy),
            },
            request,
            callbacks,
        );
        election.schedule();
        self.election = Some(election);
    }

    async fn on_exit(&mut self, _ctx: &mut NodeContext) {
        self.timer = None;
        if let Some(mut election) = self.election.take() {
            election.shutdown().await;
        }
    }

    fn handle_append_entries(&mut self, ctx: &mut NodeContext, _input: AppendEntriesInput) -> AppendEntriesOutput {
        super::reject_append_entries(ctx.current_term(), AppendEntriesRejection::NotFollower)
    }

    fn handle_request_vote(&mut self, ctx: &mut NodeContext, input: RequestVoteInput) -> RequestVoteOutput {
        slog::info!(ctx.logger, "Not granting vote to {}. We voted for ourselves.", input.candidate_id);
        super::deny_vote(ctx.current_term())
    }
}

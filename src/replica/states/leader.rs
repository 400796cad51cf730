use crate::replica::control::ControlCommand;
use crate::replica::peers::NodeId;
use crate::replica::replica_api::{
    AppendEntriesInput, AppendEntriesOutput, AppendEntriesRejection, OpCategory, RequestVoteInput,
    RequestVoteOutput,
};
use crate::replica::replication::{LeaderContext, Replicator};
use crate::replica::states::{NodeContext, RaftState, StateKind};
use crate::replica::write_ahead_log::{lock_log, LogEntry, ReplicatedLog};
use std::sync::Arc;

pub(super) struct LeaderState {
    replicator: Option<Replicator>,
}

impl LeaderState {
    pub(super) fn new() -> Self {
        LeaderState { replicator: None }
    }

    // Followers learn about the new leader once this entry commits. Committing it also commits
    // every control entry of older terms before it.
    fn announce_leadership(&self, ctx: &NodeContext) {
        let data = match ControlCommand::consensus_change(ctx.my_node_id().clone()).encode() {
            Ok(data) => data,
            Err(e) => {
                slog::error!(ctx.logger, "Failed to encode leadership announcement: {}", e);
                return;
            }
        };

        let control_topic = ctx.registry.control_topic();
        let appended = lock_log(control_topic.log()).append(LogEntry::new(ctx.current_term(), data));
        match appended {
            Ok(index) => slog::debug!(ctx.logger, "Announced leadership at control index {:?}", index),
            Err(e) => slog::error!(ctx.logger, "Failed to announce leadership: {}", e),
        }
    }
}

#[async_trait::async_trait]
impl RaftState for LeaderState {
    fn kind(&self) -> StateKind {
        StateKind::Leader
    }

    fn supported_ops(&self) -> &'static [OpCategory] {
        &[OpCategory::Read, OpCategory::Write]
    }

    fn known_leader(&self, ctx: &NodeContext) -> Option<NodeId> {
        Some(ctx.my_node_id().clone())
    }

    fn on_enter(&mut self, ctx: &mut NodeContext) {
        let term = ctx.current_term();
        slog::info!(ctx.logger, "Elected leader for term {:?}", term);
        self.announce_leadership(ctx);

        let leader_ctx = Arc::new(LeaderContext {
            logger: ctx.logger.new(slog::o!("Term" => term.as_u64())),
            term,
            my_node_id: ctx.my_node_id().clone(),
            peers: ctx.cluster.peers().to_vec(),
            messenger: ctx.messenger.clone(),
            broadcast_interval: ctx.timings.broadcast_interval,
            rpc_timeout: ctx.timings.rpc_timeout,
            max_entries_per_append: ctx.timings.max_entries_per_append,
            actor_client: ctx.actor_client.clone(),
        });
        let mut replicator = Replicator::new(leader_ctx, ctx.registry.clone());
        replicator.launch();
        self.replicator = Some(replicator);
    }

    async fn on_exit(&mut self, ctx: &mut NodeContext) {
        if let Some(mut replicator) = self.replicator.take() {
            replicator.shutdown().await;
            slog::info!(ctx.logger, "Stepped down as leader of term {:?}", ctx.current_term());
        }
    }

    fn handle_append_entries(&mut self, ctx: &mut NodeContext, input: AppendEntriesInput) -> AppendEntriesOutput {
        slog::warn!(
            ctx.logger,
            "Rejecting AppendEntries from {} in our own term {:?}",
            input.leader_id,
            input.leader_term
        );
        super::reject_append_entries(ctx.current_term(), AppendEntriesRejection::NotFollower)
    }

    fn handle_request_vote(&mut self, ctx: &mut NodeContext, input: RequestVoteInput) -> RequestVoteOutput {
        slog::info!(ctx.logger, "Not granting vote to {}. We are leader.", input.candidate_id);
        super::deny_vote(ctx.current_term())
    }
}

use crate::commitlog::Index;
use crate::replica::election::ElectionTimerHandle;
use crate::replica::peers::NodeId;
use crate::replica::replica_api::{
    AppendEntriesInput, AppendEntriesOutput, AppendEntriesRejection, OpCategory, RequestVoteInput,
    RequestVoteOutput,
};
use crate::replica::states::{vote, NodeContext, RaftState, StateKind};
use crate::replica::write_ahead_log::{lock_log, LogError, ReplicatedLog, TopicLog};
use std::cmp;

pub(super) struct FollowerState {
    timer: Option<ElectionTimerHandle>,
    leader: Option<NodeId>,
}

impl FollowerState {
    pub(super) fn new() -> Self {
        FollowerState {
            timer: None,
            leader: None,
        }
    }

    fn reset_timeout(&self) {
        if let Some(timer) = &self.timer {
            timer.reset_timeout();
        }
    }
}

#[async_trait::async_trait]
impl RaftState for FollowerState {
    fn kind(&self) -> StateKind {
        StateKind::Follower
    }

    fn supported_ops(&self) -> &'static [OpCategory] {
        &[]
    }

    fn known_leader(&self, _ctx: &NodeContext) -> Option<NodeId> {
        self.leader.clone()
    }

    fn on_enter(&mut self, ctx: &mut NodeContext) {
        self.timer = Some(ElectionTimerHandle::spawn_timer_task(
            ctx.timings.election_min_timeout,
            ctx.timings.election_max_timeout,
            ctx.actor_client.clone(),
            ctx.current_term(),
        ));
    }

    async fn on_exit(&mut self, _ctx: &mut NodeContext) {
        // Dropping the handle stops the timer task.
        self.timer = None;
    }

    fn handle_append_entries(&mut self, ctx: &mut NodeContext, input: AppendEntriesInput) -> AppendEntriesOutput {
        // 1. Reply false if term < currentTerm (§5.1)
        let current_term = ctx.current_term();
        if input.leader_term < current_term {
            return super::reject_append_entries(current_term, AppendEntriesRejection::StaleTerm);
        }

        // A newer term was already adopted before we got here, so this is the leader of our term.
        self.reset_timeout();
        if self.leader.as_ref() != Some(&input.leader_id) {
            slog::info!(ctx.logger, "Following leader {} in term {:?}", input.leader_id, current_term);
            self.leader = Some(input.leader_id.clone());
        }

        let topic = match ctx.registry.get_by_id(&input.topic_id) {
            Some(topic) => topic,
            None => {
                slog::debug!(ctx.logger, "AppendEntries for unknown topic {}", input.topic_id);
                return super::reject_append_entries(current_term, AppendEntriesRejection::UnknownTopic);
            }
        };

        let result = append_to_log(&mut lock_log(topic.log()), input);
        if let Err(AppendEntriesRejection::LocalLogFailure(e)) = &result {
            slog::error!(ctx.logger, "Failed to apply AppendEntries to topic {:?}: {}", topic, e);
        }

        AppendEntriesOutput {
            term: current_term,
            result,
        }
    }

    fn handle_request_vote(&mut self, ctx: &mut NodeContext, input: RequestVoteInput) -> RequestVoteOutput {
        let output = vote::decide_vote(ctx, &input);
        // > If election timeout elapses without receiving AppendEntries
        // > RPC from current leader or granting vote to candidate:
        // > convert to candidate
        if output.vote_granted {
            self.reset_timeout();
        }

        output
    }
}

/// Applies the leader's entries to our copy of the topic log. On success returns the index of the
/// last entry we now know to match the leader's log.
fn append_to_log(log: &mut TopicLog, input: AppendEntriesInput) -> Result<Index, AppendEntriesRejection> {
    // 2. Reply false if [my] log doesn't contain an entry at [leader's]
    // prevLogIndex whose term matches [leader's] prevLogTerm (§5.3)
    if let Some((leader_prev_entry_term, leader_prev_entry_index)) = input.leader_previous_log_entry {
        match log.read(leader_prev_entry_index).map_err(local_failure)? {
            Some(my_previous_log_entry) if my_previous_log_entry.term == leader_prev_entry_term => {}
            _ => return Err(AppendEntriesRejection::MissingPreviousEntry),
        }
    }

    let previous_log_index = input.previous_log_index();
    let index_of_last_new_entry = previous_log_index.plus(input.new_entries.len() as u64);

    // 3. If [my] existing entry conflicts with [leader's new entries]
    // (same index but different terms), delete [my] existing entry and
    // all that follow it (§5.3)
    // 4. Append any new entries not already in the log
    let mut next_entry_index = previous_log_index.plus(1);
    for new_entry in input.new_entries.into_iter() {
        match log.read(next_entry_index).map_err(local_failure)? {
            // 4. (no-op)
            Some(existing_entry) if existing_entry.term == new_entry.term => {}
            // 3. (delete) and 4. (append)
            _ => {
                log.append_at(next_entry_index, new_entry).map_err(local_failure)?;
            }
        }
        next_entry_index = next_entry_index.plus(1);
    }

    // 5. If leaderCommit > commitIndex, set commitIndex = min(leaderCommit, index of last new entry)
    let new_commit_index = cmp::min(input.leader_commit_index, index_of_last_new_entry);
    if new_commit_index > log.commit_index() {
        log.commit(new_commit_index).map_err(local_failure)?;
    }

    Ok(index_of_last_new_entry)
}

fn local_failure(e: LogError) -> AppendEntriesRejection {
    AppendEntriesRejection::LocalLogFailure(e.to_string())
}

use crate::commitlog::Index;
use crate::replica::replica_api::{RequestVoteInput, RequestVoteOutput};
use crate::replica::states::NodeContext;
use crate::replica::topic::TopicId;
use crate::replica::write_ahead_log::{lock_log, ReplicatedLog};
use crate::replica::Term;
use std::collections::HashMap;

/// Vote decision of a node that is willing to vote at all (a follower).
pub(super) fn decide_vote(ctx: &mut NodeContext, input: &RequestVoteInput) -> RequestVoteOutput {
    // Read our local term/vote state as 1 atomic action.
    let (current_term, opt_voted_for) = ctx.local_state.voted_for_current_term();

    // 1. Reply false if term < currentTerm (§5.1)
    if input.candidate_term < current_term {
        slog::info!(ctx.logger, "Not granting vote. Candidate term is out of date.");
        return super::deny_vote(current_term);
    }

    // 2. If votedFor is null or candidateId, and candidate’s log is at
    // least as up-to-date as receiver’s log, grant vote (§5.2, §5.4).

    // If votedFor is null or candidateId, and...
    if let Some(voted_for) = opt_voted_for {
        if voted_for != input.candidate_id {
            slog::info!(ctx.logger, "Not granting vote. We already voted for {}.", voted_for);
            return super::deny_vote(current_term);
        }
    }

    // ...and candidate’s log is at least as up-to-date as receiver’s log...
    if let Some(topic_id) = first_topic_behind_mine(ctx, &input.candidate_last_log_entries) {
        slog::info!(
            ctx.logger,
            "Not granting vote. Candidate log of topic {} is out of date.",
            topic_id
        );
        return super::deny_vote(current_term);
    }

    // ...grant vote
    let vote_granted = ctx
        .local_state
        .store_vote_for_term_if_unvoted(input.candidate_term, input.candidate_id.clone());
    if vote_granted {
        slog::info!(ctx.logger, "Voting for {}.", input.candidate_id);
    } else {
        slog::info!(ctx.logger, "Not granting vote. Term changed while deciding.");
    }

    RequestVoteOutput {
        term: current_term,
        vote_granted,
    }
}

// Every topic we hold entries for must be at least as up-to-date on the candidate, otherwise the
// candidate could overwrite entries of that topic which a majority already acknowledged.
fn first_topic_behind_mine(ctx: &NodeContext, candidate_entries: &HashMap<TopicId, (Term, Index)>) -> Option<TopicId> {
    ctx.registry.topics().into_iter().find_map(|topic| {
        let mine = lock_log(topic.log()).last_entry();
        let candidate = candidate_entries.get(topic.id()).copied();
        if is_candidate_log_gte_mine(mine, candidate) {
            None
        } else {
            Some(topic.id().clone())
        }
    })
}

fn is_candidate_log_gte_mine(mine: Option<(Term, Index)>, candidate: Option<(Term, Index)>) -> bool {
    // > Raft determines which of two logs is more up-to-date
    // > by comparing the index and term of the last entries in the
    // > logs. If the logs have last entries with different terms, then
    // > the log with the later term is more up-to-date. If the logs
    // > end with the same term, then whichever log is longer is
    // > more up-to-date.
    match (mine, candidate) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some((my_term, my_index)), Some((candidate_term, candidate_index))) => {
            if candidate_term != my_term {
                return candidate_term > my_term;
            }

            candidate_index >= my_index
        }
    }
}

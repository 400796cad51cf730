//! The three raft roles. A node is always in exactly one of them, and moves between them only via
//! `Replica`, which exits the old state before entering the new one.

mod candidate;
mod context;
mod follower;
mod leader;
mod transition;
mod vote;

use crate::replica::replica_api::{
    AppendEntriesInput, AppendEntriesOutput, AppendEntriesRejection, OpCategory, RequestVoteInput,
    RequestVoteOutput,
};
use crate::replica::peers::NodeId;
use crate::replica::Term;

pub(crate) use context::NodeContext;
pub(crate) use context::ReplicaTimings;
pub(crate) use transition::default_rules;
pub(crate) use transition::find_rule;
pub(crate) use transition::RequestKind;
pub(crate) use transition::TransitionRule;
pub(crate) use transition::TransitionTrigger;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StateKind {
    Follower,
    Candidate,
    Leader,
}

#[async_trait::async_trait]
pub(crate) trait RaftState: Send {
    fn kind(&self) -> StateKind;

    /// Client operations this state serves. Anything else is redirected.
    fn supported_ops(&self) -> &'static [OpCategory];

    /// Leader this state believes in, if any.
    fn known_leader(&self, _ctx: &NodeContext) -> Option<NodeId> {
        None
    }

    fn on_enter(&mut self, ctx: &mut NodeContext);

    /// Returns once every background task the state started has stopped.
    async fn on_exit(&mut self, ctx: &mut NodeContext);

    fn handle_append_entries(&mut self, ctx: &mut NodeContext, input: AppendEntriesInput) -> AppendEntriesOutput;

    fn handle_request_vote(&mut self, ctx: &mut NodeContext, input: RequestVoteInput) -> RequestVoteOutput;
}

pub(crate) fn new_state(kind: StateKind) -> Box<dyn RaftState> {
    match kind {
        StateKind::Follower => Box::new(follower::FollowerState::new()),
        StateKind::Candidate => Box::new(candidate::CandidateState::new()),
        StateKind::Leader => Box::new(leader::LeaderState::new()),
    }
}

fn reject_append_entries(term: Term, rejection: AppendEntriesRejection) -> AppendEntriesOutput {
    AppendEntriesOutput {
        term,
        result: Err(rejection),
    }
}

fn deny_vote(term: Term) -> RequestVoteOutput {
    RequestVoteOutput {
        term,
        vote_granted: false,
    }
}

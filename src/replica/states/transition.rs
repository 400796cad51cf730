use crate::replica::states::{NodeContext, StateKind};
use crate::replica::Term;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RequestKind {
    AppendEntries,
    RequestVote,
    // A reply to one of our own RPCs.
    Reply,
}

/// What a node just received, as seen by the transition rules.
#[derive(Copy, Clone, Debug)]
pub(crate) struct TransitionTrigger {
    pub(crate) state: StateKind,
    pub(crate) current_term: Term,
    pub(crate) request: RequestKind,
    pub(crate) request_term: Term,
}

/// A transition forced by an incoming message, checked before the current state handles it.
/// `pre_hook` runs after the old state exited and before the new one is entered. `post_hook` runs
/// once the new state is entered.
#[derive(Copy, Clone)]
pub(crate) struct TransitionRule {
    pub(crate) name: &'static str,
    pub(crate) predicate: fn(&TransitionTrigger) -> bool,
    pub(crate) target: StateKind,
    pub(crate) pre_hook: Option<fn(&mut NodeContext, &TransitionTrigger)>,
    pub(crate) post_hook: Option<fn(&mut NodeContext, &TransitionTrigger)>,
}

/// Rules are checked in order, first match wins.
pub(crate) fn default_rules() -> Vec<TransitionRule> {
    vec![
        // > If RPC request or response contains term T > currentTerm:
        // > set currentTerm = T, convert to follower (§5.1)
        TransitionRule {
            name: "newer_term",
            predicate: is_newer_term,
            target: StateKind::Follower,
            pre_hook: Some(adopt_request_term),
            post_hook: None,
        },
        // > If AppendEntries RPC received from new leader: convert to
        // > follower
        TransitionRule {
            name: "leader_of_current_term",
            predicate: is_leader_of_current_term,
            target: StateKind::Follower,
            pre_hook: None,
            post_hook: None,
        },
    ]
}

fn is_newer_term(trigger: &TransitionTrigger) -> bool {
    trigger.request_term > trigger.current_term
}

// Sets currentTerm and clears votedFor.
fn adopt_request_term(ctx: &mut NodeContext, trigger: &TransitionTrigger) {
    ctx.local_state.store_term_if_increased(trigger.request_term);
}

fn is_leader_of_current_term(trigger: &TransitionTrigger) -> bool {
    trigger.state == StateKind::Candidate
        && trigger.request == RequestKind::AppendEntries
        && trigger.request_term == trigger.current_term
}

pub(crate) fn find_rule<'a>(rules: &'a [TransitionRule], trigger: &TransitionTrigger) -> Option<&'a TransitionRule> {
    rules.iter().find(|rule| (rule.predicate)(trigger))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(state: StateKind, current_term: u64, request: RequestKind, request_term: u64) -> TransitionTrigger {
        TransitionTrigger {
            state,
            current_term: Term::new(current_term),
            request,
            request_term: Term::new(request_term),
        }
    }

    fn matched_rule(trigger: TransitionTrigger) -> Option<&'static str> {
        find_rule(&default_rules(), &trigger).map(|rule| rule.name)
    }

    #[test]
    fn newer_term_always_demotes() {
        for state in [StateKind::Follower, StateKind::Candidate, StateKind::Leader].iter() {
            for request in [RequestKind::AppendEntries, RequestKind::RequestVote, RequestKind::Reply].iter() {
                assert_eq!(matched_rule(trigger(*state, 3, *request, 4)), Some("newer_term"));
            }
        }
    }

    #[test]
    fn candidate_yields_to_leader_of_its_term() {
        assert_eq!(
            matched_rule(trigger(StateKind::Candidate, 3, RequestKind::AppendEntries, 3)),
            Some("leader_of_current_term")
        );
        assert_eq!(matched_rule(trigger(StateKind::Candidate, 3, RequestKind::RequestVote, 3)), None);
        assert_eq!(matched_rule(trigger(StateKind::Follower, 3, RequestKind::AppendEntries, 3)), None);
        assert_eq!(matched_rule(trigger(StateKind::Leader, 3, RequestKind::AppendEntries, 3)), None);
    }

    #[test]
    fn same_or_older_term_never_matches_otherwise() {
        assert_eq!(matched_rule(trigger(StateKind::Leader, 3, RequestKind::Reply, 3)), None);
        assert_eq!(matched_rule(trigger(StateKind::Follower, 3, RequestKind::RequestVote, 2)), None);
    }
}

use crate::replica::peers::NodeId;
use std::fmt;

#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Default)]
pub struct Term(u64);

impl Term {
    pub fn new(term: u64) -> Self {
        Term(term)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn incr(&mut self) {
        self.0 += 1;
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// PersistentLocalState is the node's `{currentTerm, votedFor}` context. The raft paper requires
/// it to be durable before answering any RPC that depends on it.
///
/// Store methods should be implemented atomically via a CAS like operation. Similar to most CAS
/// method signatures, the CAS store methods will return true if we have mutated state.
pub(crate) trait PersistentLocalState: Send {
    /// Set current term to `new_term` atomically, iff it is larger than current term. The vote
    /// for the previous term is cleared in the same step.
    ///
    /// CAS: Return true if we successfully mutated state.
    fn store_term_if_increased(&mut self, new_term: Term) -> bool;

    /// Store our vote for the latest term iff the latest term (internal state) is the same term as
    /// the one provided, and we have not stored a vote for the latest term.
    ///
    /// CAS: Return true if we successfully mutated state.
    fn store_vote_for_term_if_unvoted(&mut self, expected_current_term: Term, vote: NodeId) -> bool;

    /// Return the new term. Used when transitioning to candidate.
    fn increment_term_and_vote_for_self(&mut self) -> Term;

    fn current_term(&self) -> Term;
    fn voted_for_current_term(&self) -> (Term, Option<NodeId>);
}

// Not persistent. Log durability is handled outside the consensus core, and the term/vote pair
// follows the same policy.
pub(crate) struct VolatileLocalState {
    current_term: Term,
    voted_for_this_term: Option<NodeId>,
    my_node_id: NodeId,
}

impl VolatileLocalState {
    pub(crate) fn new(my_node_id: NodeId) -> Self {
        VolatileLocalState {
            current_term: Term::new(0),
            voted_for_this_term: None,
            my_node_id,
        }
    }
}

impl PersistentLocalState for VolatileLocalState {
    fn store_term_if_increased(&mut self, new_term: Term) -> bool {
        if new_term <= self.current_term {
            false
        } else {
            self.current_term = new_term;
            self.voted_for_this_term = None;
            true
        }
    }

    fn store_vote_for_term_if_unvoted(&mut self, expected_term: Term, vote: NodeId) -> bool {
        if expected_term != self.current_term {
            return false;
        }

        match &self.voted_for_this_term {
            None => {
                self.voted_for_this_term.replace(vote);
                true
            }
            Some(existing) => *existing == vote,
        }
    }

    fn increment_term_and_vote_for_self(&mut self) -> Term {
        self.current_term.incr();
        self.voted_for_this_term.replace(self.my_node_id.clone());

        self.current_term
    }

    fn current_term(&self) -> Term {
        self.current_term
    }

    fn voted_for_current_term(&self) -> (Term, Option<NodeId>) {
        (self.current_term, self.voted_for_this_term.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increasing_term_clears_vote() {
        let mut state = VolatileLocalState::new(NodeId::new("me"));
        let term = state.increment_term_and_vote_for_self();
        assert_eq!(term, Term::new(1));
        assert_eq!(state.voted_for_current_term(), (Term::new(1), Some(NodeId::new("me"))));

        assert!(!state.store_term_if_increased(Term::new(1)));
        assert_eq!(state.voted_for_current_term().1, Some(NodeId::new("me")));

        assert!(state.store_term_if_increased(Term::new(5)));
        assert_eq!(state.voted_for_current_term(), (Term::new(5), None));
    }

    #[test]
    fn one_vote_per_term() {
        let mut state = VolatileLocalState::new(NodeId::new("me"));
        state.store_term_if_increased(Term::new(3));

        assert!(!state.store_vote_for_term_if_unvoted(Term::new(2), NodeId::new("a")));
        assert!(state.store_vote_for_term_if_unvoted(Term::new(3), NodeId::new("a")));
        // Re-voting for the same candidate is allowed (candidate retried), a different one isn't.
        assert!(state.store_vote_for_term_if_unvoted(Term::new(3), NodeId::new("a")));
        assert!(!state.store_vote_for_term_if_unvoted(Term::new(3), NodeId::new("b")));
    }
}

use crate::replica::election::ElectionTally;

/// ElectionStrategy decides when an election attempt is over, and whether it was won.
pub trait ElectionStrategy: Send {
    fn is_complete(&self, tally: &ElectionTally) -> bool;

    fn is_successful(&self, tally: &ElectionTally) -> bool;
}

/// Won with a strict majority of the whole cluster. Lost as soon as the remaining votes can't
/// reach a majority.
#[derive(Copy, Clone, Debug, Default)]
pub struct MajorityElectionStrategy;

impl MajorityElectionStrategy {
    fn majority(tally: &ElectionTally) -> usize {
        (tally.total_nodes() / 2) + 1
    }
}

impl ElectionStrategy for MajorityElectionStrategy {
    fn is_complete(&self, tally: &ElectionTally) -> bool {
        let majority = Self::majority(tally);

        tally.up_votes() >= majority || tally.up_votes() + tally.outstanding() < majority
    }

    fn is_successful(&self, tally: &ElectionTally) -> bool {
        tally.up_votes() >= Self::majority(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::NodeId;

    fn tally(total: usize, up: usize, down: usize) -> ElectionTally {
        let mut tally = ElectionTally::new(total);
        for i in 0..up {
            tally.record_up_vote(NodeId::new(format!("up-{}", i)));
        }
        for i in 0..down {
            tally.record_down_vote(NodeId::new(format!("down-{}", i)));
        }
        tally
    }

    #[test]
    fn majority_decisions() {
        fn run(total: usize, up: usize, down: usize, complete: bool, successful: bool) {
            let t = tally(total, up, down);
            let strategy = MajorityElectionStrategy;
            assert_eq!(strategy.is_complete(&t), complete, "total={} up={} down={}", total, up, down);
            assert_eq!(strategy.is_successful(&t), successful, "total={} up={} down={}", total, up, down);
        }

        // single node
        run(1, 0, 0, false, false);
        run(1, 1, 0, true, true);

        // 3-cluster
        run(3, 1, 0, false, false);
        run(3, 2, 0, true, true);
        run(3, 1, 1, false, false);
        run(3, 1, 2, true, false);

        // 4-cluster needs 3
        run(4, 2, 1, false, false);
        run(4, 2, 2, true, false);
        run(4, 3, 1, true, true);

        // 5-cluster
        run(5, 1, 0, false, false);
        run(5, 3, 0, true, true);
        run(5, 2, 2, false, false);
        run(5, 1, 3, true, false);
        run(5, 2, 3, true, false);
    }
}

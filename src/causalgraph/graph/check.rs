use crate::frontier::frontier_is_sorted;
use crate::{Frontier, Graph};

impl Graph {
    /// The graph's frontier, recomputed from scratch by replaying every
    /// entry. Slow; test use only.
    pub(crate) fn dbg_get_frontier_inefficiently(&self) -> Frontier {
        let mut frontier = Frontier::root();
        for e in self.entries.iter() {
            frontier.advance_by_known_run(e.parents.as_ref(), e.span);
        }
        frontier
    }

    /// Panic unless the parents structure is internally consistent: entries
    /// dense from version 0, maximally merged, and every parent pointing
    /// strictly backwards.
    #[allow(unused)]
    pub(crate) fn dbg_check(&self) {
        self.entries.check_packed_from_0();
        self.entries.check_fully_merged();

        for e in self.entries.iter() {
            assert!(e.span.end > e.span.start, "entry {:?} is empty", e);
            assert!(frontier_is_sorted(e.parents.as_ref()));
            for &p in e.parents.iter() {
                assert!(p < e.span.start, "parent {} not earlier than {:?}", p, e.span);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::causalgraph::graph::tools::tests::fancy_graph;

    #[test]
    fn recomputed_frontier_matches() {
        let graph = fancy_graph();
        assert_eq!(graph.dbg_get_frontier_inefficiently().as_ref(), &[5, 10]);
    }
}

//! Equality between causal graphs on different peers.
//!
//! Two graphs are equal when they know the same set of public `(agent, seq)`
//! pairs with the same parent structure. Local version assignment is an
//! artefact of arrival order, and agent interning order is arbitrary, so
//! neither takes part in the comparison. This is mostly here for fuzzing
//! and tests; it is not tuned for very large graphs.

use crate::rle::HasLength;
use crate::{CausalGraph, Frontier, LV};

impl PartialEq for CausalGraph {
    fn eq(&self, other: &Self) -> bool {
        // Same number of changes...
        if self.len() != other.len() {
            return false;
        }

        // ...from the same agents, covering the same seq ranges. Since the
        // totals match, checking that each of our runs exists in other with
        // matching parents is sufficient.
        for c in self.agent_assignment.client_data.iter() {
            if c.is_empty() {
                continue;
            }
            match other.get_agent_id(&c.name) {
                Some(other_agent) => {
                    let other_c = &other.agent_assignment.client_data[other_agent as usize];
                    if other_c.get_next_seq() != c.get_next_seq() {
                        return false;
                    }
                }
                None => return false,
            }
        }

        let map_lv_to_other = |v: LV| -> Option<LV> {
            let rv = self.lv_to_remote_version(v);
            other.agent_assignment.try_remote_to_local_version(&rv.agent, rv.seq)
        };

        for entry in self.iter() {
            // The run's first change must carry the same parents over there.
            let Some(other_start) = map_lv_to_other(entry.start) else {
                return false;
            };
            let mapped_parents: Option<Frontier> = entry
                .parents
                .iter()
                .map(|&p| map_lv_to_other(p))
                .collect::<Option<_>>()
                .map(|lvs: Vec<LV>| Frontier::from_unsorted(&lvs));
            match mapped_parents {
                Some(parents) => {
                    if other.graph.parents_at(other_start) != parents {
                        return false;
                    }
                }
                None => return false,
            }

            // The rest of the run is linear here; walk other's runs across
            // the same seqs and check each boundary continues linearly
            // there too.
            let mut seq_range = entry.span.seq_range;
            let mut prev_lv_other = None;
            while !seq_range.is_empty() {
                let Ok(chunk) = other
                    .agent_assignment
                    .remote_to_local_version_span(self.get_agent_name(entry.span.agent), seq_range)
                else {
                    return false;
                };

                if let Some(prev) = prev_lv_other {
                    if other.graph.parents_at(chunk.start).as_ref() != [prev] {
                        return false;
                    }
                }

                prev_lv_other = Some(chunk.last());
                seq_range.start += chunk.len();
            }
        }

        true
    }
}

impl Eq for CausalGraph {}

#[cfg(test)]
mod tests {
    use crate::causalgraph::agent_span::AgentSpan;
    use crate::CausalGraph;

    fn is_eq(a: &CausalGraph, b: &CausalGraph) -> bool {
        let a_eq_b = a.eq(b);
        let b_eq_a = b.eq(a);
        assert_eq!(a_eq_b, b_eq_a);
        a_eq_b
    }

    #[test]
    fn eq_ignores_arrival_order() {
        let mut a = CausalGraph::new();
        let seph = a.get_or_create_agent_id("seph");
        let mike = a.get_or_create_agent_id("mike");
        a.merge_and_assign(&[], AgentSpan { agent: seph, seq_range: (0..2).into() });
        a.merge_and_assign(&[], AgentSpan { agent: mike, seq_range: (0..1).into() });

        // Same history, opposite interning and arrival order.
        let mut b = CausalGraph::new();
        let mike = b.get_or_create_agent_id("mike");
        let seph = b.get_or_create_agent_id("seph");
        b.merge_and_assign(&[], AgentSpan { agent: mike, seq_range: (0..1).into() });
        b.merge_and_assign(&[], AgentSpan { agent: seph, seq_range: (0..2).into() });

        assert!(is_eq(&a, &a));
        assert!(is_eq(&a, &b));
    }

    #[test]
    fn eq_sees_parent_differences() {
        let mut a = CausalGraph::new();
        let seph = a.get_or_create_agent_id("seph");
        let mike = a.get_or_create_agent_id("mike");
        a.merge_and_assign(&[], AgentSpan { agent: seph, seq_range: (0..2).into() });
        a.merge_and_assign(&[1], AgentSpan { agent: mike, seq_range: (0..1).into() });

        // Same public versions, but mike's change is concurrent here.
        let mut b = CausalGraph::new();
        let seph = b.get_or_create_agent_id("seph");
        let mike = b.get_or_create_agent_id("mike");
        b.merge_and_assign(&[], AgentSpan { agent: seph, seq_range: (0..2).into() });
        b.merge_and_assign(&[], AgentSpan { agent: mike, seq_range: (0..1).into() });

        assert!(!is_eq(&a, &b));
    }

    #[test]
    fn eq_sees_missing_changes() {
        let mut a = CausalGraph::new();
        let seph = a.get_or_create_agent_id("seph");
        a.merge_and_assign(&[], AgentSpan { agent: seph, seq_range: (0..2).into() });

        let mut b = a.clone();
        let mike = b.get_or_create_agent_id("mike");
        b.merge_and_assign(&[], AgentSpan { agent: mike, seq_range: (0..2).into() });

        assert!(!is_eq(&a, &b));
    }
}

//! Version summaries: a vector-clock style digest of everything a peer
//! knows, and the intersection logic which turns a remote peer's summary
//! into a shared frontier.

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

use crate::rle::{AppendRle, MergeableIterator, RleSpanHelpers};
use crate::{CausalGraph, Frontier, LVRange, LV};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The seq ranges known for one agent, RLE-merged.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VSEntry {
    pub name: SmartString,
    pub versions: SmallVec<[LVRange; 2]>,
}

/// A digest of every `(agent, seq)` pair a peer knows, ordered by agent
/// name. Summaries are tiny compared to the graph and are the first thing
/// two peers exchange when syncing.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VersionSummary(pub Vec<VSEntry>);

impl CausalGraph {
    /// Summarize everything this graph knows, per agent.
    ///
    /// Entries are sorted by agent name, so two peers with the same
    /// knowledge produce identical summaries regardless of the order they
    /// learned about agents.
    pub fn summarize(&self) -> VersionSummary {
        let mut entries: Vec<VSEntry> = self
            .agent_assignment
            .client_data
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| VSEntry {
                name: c.name.clone(),
                versions: c.item_times.iter().map(|e| e.span()).merge_spans().collect(),
            })
            .collect();

        entries.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        VersionSummary(entries)
    }

    /// For each graph entry intersecting `range`, collect the last LV of the
    /// intersection. These tails stand in for everything below them when
    /// computing dominators.
    fn collect_entry_tails(&self, range: LVRange, out: &mut Vec<LV>) {
        debug_assert!(!range.is_empty());

        for e in self.graph.entries.iter_range_unclipped(range) {
            if let Some(overlap) = e.span.intersect(&range) {
                out.push(overlap.last());
            }
        }
    }

    /// Intersect a remote peer's summary with what this graph knows.
    ///
    /// Returns the common frontier - the dominators of every change both
    /// peers know, a valid starting point for [`Graph::diff`](crate::Graph::diff) -
    /// and the portion of the remote summary this graph knows nothing about
    /// (`None` when the remote knowledge is a subset of ours).
    ///
    /// Note the caller learns only what it is *missing* from the remote
    /// side. Agents known locally but absent from the remote summary don't
    /// appear in the result at all; they simply aren't shared.
    pub fn intersect_with_summary(
        &self,
        summary: &VersionSummary,
    ) -> (Frontier, Option<VersionSummary>) {
        let mut versions: Vec<LV> = vec![];
        let mut remainder: Option<VersionSummary> = None;

        let mut add_to_remainder = |name: &SmartString, range: LVRange| {
            let remainder = remainder.get_or_insert_with(VersionSummary::default);
            match remainder.0.last_mut() {
                Some(entry) if entry.name == *name => {
                    entry.versions.push_rle(range);
                }
                _ => {
                    let mut versions = SmallVec::new();
                    versions.push(range);
                    remainder.0.push(VSEntry { name: name.clone(), versions });
                }
            }
        };

        for vs_entry in &summary.0 {
            let agent = self.agent_assignment.get_agent_id(&vs_entry.name);

            for &seq_range in &vs_entry.versions {
                let mut seq_range = seq_range;

                let Some(agent) = agent else {
                    add_to_remainder(&vs_entry.name, seq_range);
                    continue;
                };

                while !seq_range.is_empty() {
                    let client = &self.agent_assignment.client_data[agent as usize];
                    let (r, _) = client.item_times.find_sparse(seq_range.start);
                    match r {
                        Ok(pair) => {
                            // A prefix of the range is known here. Collect
                            // the graph runs it covers.
                            let offset = seq_range.start - pair.0;
                            let covered_seq_end = pair.end().min(seq_range.end);
                            let lv_start = pair.1.start + offset;
                            let lv_end = pair.1.start + (covered_seq_end - pair.0);
                            self.collect_entry_tails((lv_start..lv_end).into(), &mut versions);
                            seq_range.start = covered_seq_end;
                        }
                        Err(gap) => {
                            let miss_end = gap.end.min(seq_range.end);
                            add_to_remainder(
                                &vs_entry.name,
                                (seq_range.start..miss_end).into(),
                            );
                            seq_range.start = miss_end;
                        }
                    }
                }
            }
        }

        let frontier = self.graph.find_dominators_unsorted(&versions);
        (frontier, remainder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causalgraph::agent_span::AgentSpan;
    use crate::RemoteVersion;

    fn vs(entries: &[(&str, &[LVRange])]) -> VersionSummary {
        VersionSummary(
            entries
                .iter()
                .map(|(name, versions)| VSEntry {
                    name: (*name).into(),
                    versions: versions.iter().copied().collect(),
                })
                .collect(),
        )
    }

    #[test]
    fn summarize_single_agent() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..3).into() });

        assert_eq!(cg.summarize(), vs(&[("a", &[(0..3).into()])]));
    }

    #[test]
    fn summarize_merges_seq_runs_and_sorts_agents() {
        let mut cg = CausalGraph::new();
        let b = cg.get_or_create_agent_id("b");
        let a = cg.get_or_create_agent_id("a");
        cg.merge_and_assign(&[], AgentSpan { agent: b, seq_range: (0..2).into() });
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });
        // Same agent on a concurrent branch: seqs 2..4 parented at seq 0.
        cg.merge_remote_span("b", (2..4).into(), &[RemoteVersion::new("b", 0)])
            .unwrap();

        // b's seqs 0..2 and 2..4 sit on different LV spans but fuse in the
        // summary.
        assert_eq!(
            cg.summarize(),
            vs(&[("a", &[(0..2).into()]), ("b", &[(0..4).into()])])
        );
    }

    #[test]
    fn summarize_skips_holes() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..3).into() });
        cg.merge_remote_span("a", (10..12).into(), &[RemoteVersion::new("a", 2)])
            .unwrap();

        assert_eq!(cg.summarize(), vs(&[("a", &[(0..3).into(), (10..12).into()])]));
    }

    #[test]
    fn intersect_with_identical_peer() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        let b = cg.get_or_create_agent_id("b");
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });
        cg.merge_and_assign(&[], AgentSpan { agent: b, seq_range: (0..2).into() });

        let (frontier, remainder) = cg.intersect_with_summary(&cg.summarize());
        assert_eq!(frontier, cg.version);
        assert_eq!(remainder, None);
    }

    #[test]
    fn intersect_with_empty_peer() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });

        let (frontier, remainder) = cg.intersect_with_summary(&VersionSummary::default());
        assert!(frontier.is_root());
        assert_eq!(remainder, None);
    }

    #[test]
    fn intersect_reports_remote_only() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });

        // The remote peer knows more of a's changes, plus an agent we've
        // never heard of.
        let summary = vs(&[("a", &[(0..5).into()]), ("x", &[(0..3).into()])]);
        let (frontier, remainder) = cg.intersect_with_summary(&summary);

        assert_eq!(frontier.as_ref(), &[1]);
        assert_eq!(
            remainder,
            Some(vs(&[("a", &[(2..5).into()]), ("x", &[(0..3).into()])]))
        );
    }

    #[test]
    fn intersect_finds_common_dominators_across_branches() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        let b = cg.get_or_create_agent_id("b");
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });
        cg.merge_and_assign(&[], AgentSpan { agent: b, seq_range: (0..2).into() });
        cg.merge_and_assign(&[1, 3], AgentSpan { agent: a, seq_range: (2..3).into() });

        // The remote peer only knows the two original branches.
        let summary = vs(&[("a", &[(0..2).into()]), ("b", &[(0..2).into()])]);
        let (frontier, remainder) = cg.intersect_with_summary(&summary);
        assert_eq!(frontier.as_ref(), &[1, 3]);
        assert_eq!(remainder, None);
    }
}

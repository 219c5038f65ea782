//! The causal graph store itself: assignment of local versions, the
//! bidirectional public-id index, and the advancing frontier.

use smallvec::SmallVec;

use crate::causalgraph::agent_assignment::remote_ids::RemoteVersion;
use crate::causalgraph::agent_assignment::AgentAssignment;
use crate::causalgraph::agent_span::AgentSpan;
use crate::causalgraph::entry::CGEntry;
use crate::error::CgError;
use crate::frontier::debug_assert_frontier_sorted;
use crate::rle::{KVPair, RleSpanHelpers};
use crate::{AgentId, Frontier, Graph, LVRange, LV};

pub mod agent_assignment;
pub mod agent_span;
pub mod entry;
pub mod graph;
pub mod serialize;
pub mod summary;

mod check;
mod eq;
#[cfg(test)]
mod fuzzer;

/// A causal graph: the complete known history of a set of agents, stored as
/// the causal "skeleton" only. No operation payloads live here.
#[derive(Clone, Debug, Default)]
pub struct CausalGraph {
    /// Maps local versions to/from their public `(agent, seq)` identities.
    pub agent_assignment: AgentAssignment,

    /// The parents of every change. This is what `diff` and
    /// `version_contains` walk when merging remote changes.
    pub graph: Graph,

    /// The version you get when you have every change in the graph: the
    /// dominator set of everything stored.
    pub version: Frontier,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of changes stored. The next assigned LV will be `len()`.
    pub fn len(&self) -> usize {
        let len = self.agent_assignment.len();
        debug_assert_eq!(len, self.graph.len());
        len
    }

    pub fn is_empty(&self) -> bool {
        self.agent_assignment.is_empty()
    }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.agent_assignment.get_agent_id(name)
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.agent_assignment.get_or_create_agent_id(name)
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.agent_assignment.get_agent_name(agent)
    }

    /// The next sequence number the named agent would assign, skipping over
    /// any holes in its history. Returns 0 for unknown agents.
    pub fn next_seq_for_agent(&self, name: &str) -> usize {
        self.agent_assignment.next_seq_for_agent(name)
    }

    pub fn has_remote_version(&self, agent: &str, seq: usize) -> bool {
        self.agent_assignment.has_remote_version(agent, seq)
    }

    /// The canonical (tie-break) order of two local versions: lexicographic
    /// on agent name, then seq. Only meaningful for concurrent versions.
    pub fn tie_break_versions(&self, a: LV, b: LV) -> std::cmp::Ordering {
        self.agent_assignment.tie_break_versions(a, b)
    }

    /// Assign `num` new changes to `agent` with explicit parents.
    pub fn assign_local_op_with_parents(
        &mut self,
        parents: &[LV],
        agent: AgentId,
        num: usize,
    ) -> LVRange {
        debug_assert_frontier_sorted(parents);

        let start = self.len();
        let span: LVRange = (start..start + num).into();

        self.agent_assignment.assign_next_lv_to_client_known(agent, span);
        self.graph.push(parents, span);
        self.version.advance_by_known_run(parents, span);
        span
    }

    /// Assign `num` new changes to `agent`, parented at the current version.
    pub fn assign_local_op(&mut self, agent: AgentId, num: usize) -> LVRange {
        let parents = self.version.clone();
        self.assign_local_op_with_parents(parents.as_ref(), agent, num)
    }

    /// Merge a possibly-already-known span of changes into the graph.
    ///
    /// This is the idempotent workhorse the sync layer drives. There are
    /// three cases:
    /// 1. The span is entirely known. Nothing happens.
    /// 2. The span is entirely new (the common case). All of it is assigned.
    /// 3. Some prefix is known. The overlap must be a prefix, because every
    ///    change's parents must be known before it; the remainder is
    ///    assigned, chained off the last known change.
    ///
    /// `parents` applies to the first change of the span. Returns the range
    /// of local versions assigned - empty when the span was fully known.
    pub fn merge_and_assign(&mut self, parents: &[LV], mut span: AgentSpan) -> LVRange {
        debug_assert_frontier_sorted(parents);

        let start = self.len();

        // After the first assigned or skipped chunk, the rest of the span
        // chains linearly off the chunk before it.
        let mut chain_parent: Option<LV> = None;

        while !span.seq_range.is_empty() {
            let found = {
                let client_data = &self.agent_assignment.client_data[span.agent as usize];
                let (r, _) = client_data.item_times.find_sparse(span.seq_range.start);
                r.map(|e| *e)
            };

            match found {
                Ok(entry) => {
                    // A prefix of the span is already known.
                    let known_end = entry.end();
                    if known_end >= span.seq_range.end {
                        break; // Fully known.
                    }
                    span.seq_range.start = known_end;
                    chain_parent = Some(entry.1.last());
                }
                Err(gap) => {
                    // Unknown from here to the gap's end; assign what fits.
                    let len_here =
                        usize::min(span.seq_range.end, gap.end) - span.seq_range.start;
                    let seq_here: LVRange =
                        (span.seq_range.start..span.seq_range.start + len_here).into();

                    let time_start = self.len();
                    let time_span: LVRange = (time_start..time_start + len_here).into();

                    let parent_holder: [LV; 1];
                    let p: &[LV] = match chain_parent {
                        Some(lv) => {
                            parent_holder = [lv];
                            &parent_holder
                        }
                        None => parents,
                    };

                    let client_data =
                        &mut self.agent_assignment.client_data[span.agent as usize];
                    let idx = client_data
                        .item_times
                        .find_index(seq_here.start)
                        .unwrap_err();
                    client_data
                        .item_times
                        .insert_at_idx(idx, KVPair(seq_here.start, time_span));

                    self.agent_assignment.client_with_lv.push(KVPair(
                        time_start,
                        AgentSpan { agent: span.agent, seq_range: seq_here },
                    ));
                    self.graph.push(p, time_span);
                    self.version.advance_by_known_run(p, time_span);

                    span.seq_range.start = seq_here.end;
                    chain_parent = Some(time_span.last());
                }
            }
        }

        (start..self.len()).into()
    }

    /// Merge a span of changes named publicly, with explicit public parents.
    /// All parents must already be known here.
    pub fn merge_remote_span(
        &mut self,
        agent: &str,
        seq_range: LVRange,
        parents: &[RemoteVersion],
    ) -> Result<LVRange, CgError> {
        let parents = self
            .agent_assignment
            .remote_to_local_frontier(parents.iter())?;
        let agent = self.get_or_create_agent_id(agent);
        Ok(self.merge_and_assign(parents.as_ref(), AgentSpan { agent, seq_range }))
    }

    /// As [`merge_remote_span`](CausalGraph::merge_remote_span), parented at
    /// the current version.
    pub fn merge_remote_span_at_head(
        &mut self,
        agent: &str,
        seq_range: LVRange,
    ) -> Result<LVRange, CgError> {
        let parents = self.version.clone();
        let agent = self.get_or_create_agent_id(agent);
        Ok(self.merge_and_assign(parents.as_ref(), AgentSpan { agent, seq_range }))
    }

    pub fn lv_to_remote_version(&self, v: LV) -> RemoteVersion {
        self.agent_assignment.local_to_remote_version(v)
    }

    /// The public identity of `v` together with its parents: `[v - 1]` when
    /// `v` sits inside a run, the run's stored parents otherwise.
    pub fn lv_to_remote_version_with_parents(&self, v: LV) -> (RemoteVersion, Frontier) {
        (
            self.agent_assignment.local_to_remote_version(v),
            self.graph.parents_at(v),
        )
    }

    pub fn lv_list_to_remote(&self, lvs: &[LV]) -> Vec<RemoteVersion> {
        lvs.iter()
            .map(|&v| self.lv_to_remote_version(v))
            .collect()
    }

    /// The run containing `v`, aligned to both indexes: maximal over
    /// contiguous LVs, one agent, contiguous seqs and linear parents.
    pub fn entry_containing(&self, v: LV) -> Result<CGEntry, CgError> {
        if v >= self.len() {
            return Err(CgError::NotFound);
        }

        let ge = self.graph.entry_containing(v);
        let (pair, _) = self.agent_assignment.client_with_lv.find_packed_with_offset(v);

        let start = ge.span.start.max(pair.0);
        let end = ge.span.end.min(pair.end());
        debug_assert!(start <= v && v < end);

        let parents = if start == ge.span.start {
            ge.parents.clone()
        } else {
            Frontier::new_1(start - 1)
        };

        let seq_start = pair.1.seq_range.start + (start - pair.0);
        Ok(CGEntry {
            start,
            parents,
            span: AgentSpan {
                agent: pair.1.agent,
                seq_range: (seq_start..seq_start + (end - start)).into(),
            },
        })
    }

    /// Iterate the whole graph as [`CGEntry`] runs, in LV order.
    pub fn iter(&self) -> CGEntryIter<'_> {
        self.iter_range((0..self.len()).into())
    }

    /// Iterate the runs intersecting `range`, clipped to it.
    pub fn iter_range(&self, range: LVRange) -> CGEntryIter<'_> {
        CGEntryIter { cg: self, range }
    }

    /// The ranges a peer at `frontier` is missing, in causal order.
    pub fn diff_since(&self, frontier: &[LV]) -> SmallVec<[LVRange; 4]> {
        self.graph.diff(frontier, self.version.as_ref()).1
    }
}

/// Cursor over the graph, yielding clipped [`CGEntry`] runs.
#[derive(Clone)]
pub struct CGEntryIter<'a> {
    cg: &'a CausalGraph,
    range: LVRange,
}

impl<'a> Iterator for CGEntryIter<'a> {
    type Item = CGEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.is_empty() {
            return None;
        }

        let lv = self.range.start;
        let ge = self.cg.graph.entry_containing(lv);
        let (pair, offset) = self
            .cg
            .agent_assignment
            .client_with_lv
            .find_packed_with_offset(lv);

        // The graph run and the identity run may end at different points;
        // stop at whichever comes first.
        let end = ge.span.end.min(pair.end()).min(self.range.end);
        let len_here = end - lv;

        let seq_start = pair.1.seq_range.start + offset;
        let entry = CGEntry {
            start: lv,
            parents: ge.clone_parents_at_version(lv),
            span: AgentSpan {
                agent: pair.1.agent,
                seq_range: (seq_start..seq_start + len_here).into(),
            },
        };

        self.range.start = end;
        Some(entry)
    }
}

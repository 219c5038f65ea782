//! Structural snapshot and delta codecs.
//!
//! Nothing here commits to a byte layout - these types are the *shape* of
//! the wire data, ready for whatever encoding the application prefers. What
//! is normative is the referencing scheme:
//!
//! - Snapshots carry raw local versions in `parents`. That's safe because a
//!   receiver replaying the snapshot in order assigns identical LVs.
//! - v2 deltas name parents by full public `(agent, seq)` pairs.
//! - v3 deltas pack parents as integers: a non-negative value is an offset
//!   into the delta itself (the prefix sum of entry lens), and a negative
//!   value `-k-1` indexes an external reference table of public versions.
//!   This is the compact format; [`CausalGraph::merge_graph`] uses it.
//!
//! Deltas are always emitted in causal order, so a receiver can resolve
//! every parent reference by the time it reaches the entry using it.

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

use crate::causalgraph::agent_assignment::remote_ids::RemoteVersion;
use crate::causalgraph::agent_span::AgentSpan;
use crate::error::CgError;
use crate::rle::{HasLength, Searchable};
use crate::{CausalGraph, Frontier, LVRange, LV};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One run of a snapshot. `parents` are raw LVs.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SerializedEntry {
    pub agent: SmartString,
    pub seq: usize,
    pub len: usize,
    pub parents: Frontier,
}

/// One run of a v2 delta. `parents` are public versions.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeltaEntryV2 {
    pub agent: SmartString,
    pub seq: usize,
    pub len: usize,
    pub parents: SmallVec<[RemoteVersion; 2]>,
}

/// One run of a v3 delta, using the packed parent encoding.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeltaEntryV3 {
    pub agent: SmartString,
    pub seq: usize,
    pub len: usize,
    pub parents: SmallVec<[i64; 2]>,
}

/// A v3 delta: packed entries plus the external reference table.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeltaV3 {
    pub ext_ref: Vec<RemoteVersion>,
    pub entries: Vec<DeltaEntryV3>,
}

impl CausalGraph {
    /// Dump the whole graph as a snapshot.
    pub fn serialize(&self) -> Vec<SerializedEntry> {
        self.iter()
            .map(|e| SerializedEntry {
                agent: self.get_agent_name(e.span.agent).into(),
                seq: e.span.seq_range.start,
                len: e.len(),
                parents: e.parents,
            })
            .collect()
    }

    /// Rebuild a graph from a snapshot. The receiver assigns exactly the
    /// LVs the snapshot's parents refer to, entry by entry.
    pub fn from_serialized(entries: &[SerializedEntry]) -> Result<CausalGraph, CgError> {
        let mut cg = CausalGraph::new();

        for (idx, e) in entries.iter().enumerate() {
            for &p in e.parents.iter() {
                if p >= cg.len() {
                    return Err(CgError::InvalidDeltaParent(idx));
                }
            }

            let agent = cg.get_or_create_agent_id(&e.agent);
            cg.merge_and_assign(
                e.parents.as_ref(),
                AgentSpan { agent, seq_range: (e.seq..e.seq + e.len).into() },
            );
        }

        Ok(cg)
    }

    /// Serialize the given LV ranges as a v2 delta. Ranges must be sorted
    /// ascending (causal order), as produced by
    /// [`Graph::diff`](crate::Graph::diff).
    pub fn serialize_diff_v2(&self, ranges: &[LVRange]) -> Vec<DeltaEntryV2> {
        let mut entries = vec![];

        for range in ranges {
            for e in self.iter_range(*range) {
                entries.push(DeltaEntryV2 {
                    agent: self.get_agent_name(e.span.agent).into(),
                    seq: e.span.seq_range.start,
                    len: e.len(),
                    parents: e
                        .parents
                        .iter()
                        .map(|&p| self.lv_to_remote_version(p))
                        .collect(),
                });
            }
        }

        entries
    }

    /// Serialize the given LV ranges as a v3 delta. Ranges must be sorted
    /// ascending (causal order).
    pub fn serialize_diff_v3(&self, ranges: &[LVRange]) -> DeltaV3 {
        let mut delta = DeltaV3::default();

        // Local spans already written, with their delta offsets. Parents
        // pointing into these are encoded relative; everything else goes
        // through the reference table.
        let mut emitted: Vec<(LVRange, usize)> = vec![];
        let mut next_offset = 0;

        for range in ranges {
            for e in self.iter_range(*range) {
                let parents = e
                    .parents
                    .iter()
                    .map(|&p| {
                        if let Some(offset) = emitted
                            .iter()
                            .find_map(|(span, base)| {
                                span.get_offset(p).map(|o| base + o)
                            })
                        {
                            offset as i64
                        } else {
                            let rv = self.lv_to_remote_version(p);
                            let k = delta
                                .ext_ref
                                .iter()
                                .position(|x| *x == rv)
                                .unwrap_or_else(|| {
                                    delta.ext_ref.push(rv);
                                    delta.ext_ref.len() - 1
                                });
                            -(k as i64) - 1
                        }
                    })
                    .collect();

                delta.entries.push(DeltaEntryV3 {
                    agent: self.get_agent_name(e.span.agent).into(),
                    seq: e.span.seq_range.start,
                    len: e.len(),
                    parents,
                });

                emitted.push((e.time_span(), next_offset));
                next_offset += e.len();
            }
        }

        delta
    }

    /// Everything a peer which has seen `since` is missing, as a v2 delta.
    pub fn serialize_from_version_v2(&self, since: &[LV]) -> Vec<DeltaEntryV2> {
        self.serialize_diff_v2(&self.diff_since(since))
    }

    /// Everything a peer which has seen `since` is missing, as a v3 delta.
    pub fn serialize_from_version_v3(&self, since: &[LV]) -> DeltaV3 {
        self.serialize_diff_v3(&self.diff_since(since))
    }

    /// Merge a v2 delta. Spans the graph already knows are skipped; that is
    /// not an error. Returns the range of LVs inserted (empty when the
    /// delta was a complete duplicate).
    pub fn merge_serialized_v2(&mut self, entries: &[DeltaEntryV2]) -> Result<LVRange, CgError> {
        let start = self.len();

        for e in entries {
            self.merge_remote_span(&e.agent, (e.seq..e.seq + e.len).into(), &e.parents)?;
        }

        Ok((start..self.len()).into())
    }

    /// Merge a v3 delta. Duplicate spans are skipped, as for v2. Malformed
    /// parent references fail with [`CgError::InvalidDeltaParent`].
    pub fn merge_serialized_v3(&mut self, delta: &DeltaV3) -> Result<LVRange, CgError> {
        let start = self.len();

        // Prefix sums of entry lens: the delta offsets each entry starts at.
        let mut bases = Vec::with_capacity(delta.entries.len());
        let mut next_offset = 0;
        for e in &delta.entries {
            bases.push(next_offset);
            next_offset += e.len;
        }

        for (idx, e) in delta.entries.iter().enumerate() {
            let mut parents: SmallVec<[LV; 2]> = SmallVec::new();
            for &p in &e.parents {
                parents.push(self.diff_offset_to_lv(delta, &bases, idx, p)?);
            }
            let parents = Frontier::from_unsorted(&parents);

            let agent = self.get_or_create_agent_id(&e.agent);
            self.merge_and_assign(
                parents.as_ref(),
                AgentSpan { agent, seq_range: (e.seq..e.seq + e.len).into() },
            );
        }

        Ok((start..self.len()).into())
    }

    /// Resolve one packed parent reference from entry `idx` of a v3 delta.
    fn diff_offset_to_lv(
        &self,
        delta: &DeltaV3,
        bases: &[usize],
        idx: usize,
        p: i64,
    ) -> Result<LV, CgError> {
        if p >= 0 {
            let offset = p as usize;
            // Only earlier entries can be referenced.
            if offset >= bases[idx] {
                return Err(CgError::InvalidDeltaParent(idx));
            }
            let j = bases.partition_point(|&b| b <= offset) - 1;
            let e = &delta.entries[j];
            self.agent_assignment
                .remote_to_local_version(&e.agent, e.seq + (offset - bases[j]))
        } else {
            let k = (-1 - p) as usize;
            let rv = delta
                .ext_ref
                .get(k)
                .ok_or(CgError::InvalidDeltaParent(idx))?;
            self.agent_assignment.remote_to_local_version(&rv.agent, rv.seq)
        }
    }

    /// Advance a frontier over a v2 delta *without* inserting anything.
    ///
    /// This computes the frontier which would result from merging the delta,
    /// assuming the graph already knows its contents - useful when several
    /// concurrent delta streams carry overlapping changes and only the first
    /// stream actually inserts them. The result may need
    /// [`Graph::find_dominators`](crate::Graph::find_dominators) if the
    /// caller's frontier wasn't derived from this graph.
    pub fn advance_version_from_serialized_v2(
        &self,
        entries: &[DeltaEntryV2],
        version: Frontier,
    ) -> Result<Frontier, CgError> {
        let mut version = version;

        for e in entries {
            if e.len == 0 {
                continue;
            }

            let mut parents: SmallVec<[LV; 2]> = SmallVec::new();
            for rv in &e.parents {
                parents.push(
                    self.agent_assignment
                        .remote_to_local_version(&rv.agent, rv.seq)?,
                );
            }
            let last = self
                .agent_assignment
                .remote_to_local_version(&e.agent, e.seq + e.len - 1)?;

            version.0.retain(|v| !parents.contains(v));
            if !version.0.contains(&last) {
                version.insert_sorted(last);
            }
        }

        Ok(version)
    }

    /// Merge everything `src` knows into this graph, peer to peer:
    /// summarize ourselves, intersect with `src` to find the common
    /// frontier, then pull the difference across as a v3 delta.
    ///
    /// Returns the range of LVs inserted here.
    pub fn merge_graph(&mut self, src: &CausalGraph) -> Result<LVRange, CgError> {
        let summary = self.summarize();
        let (common, _) = src.intersect_with_summary(&summary);
        let (_, missing) = src.graph.diff(common.as_ref(), src.version.as_ref());
        let delta = src.serialize_diff_v3(&missing);
        self.merge_serialized_v3(&delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Peer X with two concurrent branches and a merge point. The shape the
    /// docs keep coming back to:
    ///
    /// ```text
    /// a0,a1   b0,b1
    ///     \   /
    ///      c0
    /// ```
    fn merged_peer() -> CausalGraph {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        let b = cg.get_or_create_agent_id("b");
        let c = cg.get_or_create_agent_id("c");
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });
        cg.merge_and_assign(&[], AgentSpan { agent: b, seq_range: (0..2).into() });
        cg.merge_and_assign(&[1, 3], AgentSpan { agent: c, seq_range: (0..1).into() });
        cg
    }

    #[test]
    fn snapshot_round_trip() {
        let cg = merged_peer();
        let snapshot = cg.serialize();
        let restored = CausalGraph::from_serialized(&snapshot).unwrap();

        restored.dbg_check(true);
        assert_eq!(restored, cg);
        // Snapshots preserve LV assignment exactly.
        assert_eq!(restored.version, cg.version);
    }

    #[test]
    fn snapshot_rejects_forward_parents() {
        let entries = vec![SerializedEntry {
            agent: "a".into(),
            seq: 0,
            len: 2,
            parents: Frontier::new_1(5),
        }];
        assert_eq!(
            CausalGraph::from_serialized(&entries),
            Err(CgError::InvalidDeltaParent(0))
        );
    }

    #[test]
    fn full_diff_round_trip_v2() {
        let cg = merged_peer();
        let delta = cg.serialize_diff_v2(&[(0..cg.len()).into()]);

        let mut restored = CausalGraph::new();
        let inserted = restored.merge_serialized_v2(&delta).unwrap();
        assert_eq!(inserted, (0..5).into());
        restored.dbg_check(true);
        assert_eq!(restored, cg);
    }

    #[test]
    fn full_diff_round_trip_v3() {
        let cg = merged_peer();
        let delta = cg.serialize_diff_v3(&[(0..cg.len()).into()]);

        // Everything within the delta must be offset-encoded; the only
        // parents here are the roots and in-delta references.
        assert!(delta.ext_ref.is_empty());

        let mut restored = CausalGraph::new();
        let inserted = restored.merge_serialized_v3(&delta).unwrap();
        assert_eq!(inserted, (0..5).into());
        restored.dbg_check(true);
        assert_eq!(restored, cg);
    }

    #[test]
    fn partitioned_diff_round_trip() {
        let cg = merged_peer();

        // Any partition of 0..len into contiguous ranges must reproduce the
        // graph when merged in order.
        for split in 1..cg.len() {
            let d1 = cg.serialize_diff_v3(&[(0..split).into()]);
            let d2 = cg.serialize_diff_v3(&[(split..cg.len()).into()]);

            let mut restored = CausalGraph::new();
            restored.merge_serialized_v3(&d1).unwrap();
            restored.merge_serialized_v3(&d2).unwrap();
            restored.dbg_check(true);
            assert_eq!(restored, cg);
        }
    }

    #[test]
    fn v3_uses_ext_ref_for_out_of_delta_parents() {
        let cg = merged_peer();

        // Serializing only the merge entry: its parents a1/b1 are outside
        // the delta and need the reference table.
        let delta = cg.serialize_diff_v3(&[(4..5).into()]);
        assert_eq!(delta.entries.len(), 1);
        assert_eq!(
            delta.ext_ref,
            vec![RemoteVersion::new("a", 1), RemoteVersion::new("b", 1)]
        );
        assert_eq!(delta.entries[0].parents.as_slice(), &[-1, -2]);

        // A peer which already has the branches can merge it.
        let mut peer = CausalGraph::new();
        let a = peer.get_or_create_agent_id("a");
        let b = peer.get_or_create_agent_id("b");
        peer.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });
        peer.merge_and_assign(&[], AgentSpan { agent: b, seq_range: (0..2).into() });
        peer.merge_serialized_v3(&delta).unwrap();
        peer.dbg_check(true);
        assert_eq!(peer, cg);
    }

    #[test]
    fn malformed_v3_parents_are_rejected() {
        let mut cg = CausalGraph::new();

        // Forward reference: entry 0 naming itself.
        let delta = DeltaV3 {
            ext_ref: vec![],
            entries: vec![DeltaEntryV3 {
                agent: "a".into(),
                seq: 0,
                len: 2,
                parents: [0i64].into_iter().collect(),
            }],
        };
        assert_eq!(cg.merge_serialized_v3(&delta), Err(CgError::InvalidDeltaParent(0)));

        // Reference table index out of bounds.
        let delta = DeltaV3 {
            ext_ref: vec![],
            entries: vec![DeltaEntryV3 {
                agent: "a".into(),
                seq: 0,
                len: 2,
                parents: [-1i64].into_iter().collect(),
            }],
        };
        assert_eq!(cg.merge_serialized_v3(&delta), Err(CgError::InvalidDeltaParent(0)));
    }

    #[test]
    fn merge_is_idempotent() {
        let cg = merged_peer();
        let delta = cg.serialize_diff_v3(&[(0..cg.len()).into()]);

        let mut peer = CausalGraph::new();
        let first = peer.merge_serialized_v3(&delta).unwrap();
        assert_eq!(first.len(), 5);

        let second = peer.merge_serialized_v3(&delta).unwrap();
        assert!(second.is_empty());
        peer.dbg_check(true);
        assert_eq!(peer, cg);
    }

    #[test]
    fn sync_round_trip_via_merge_graph() {
        let x = merged_peer();
        let mut y = CausalGraph::new();

        let inserted = y.merge_graph(&x).unwrap();
        assert_eq!(inserted.len(), x.len());
        y.dbg_check(true);

        assert_eq!(y.summarize(), x.summarize());

        let mut y_heads = y.lv_list_to_remote(y.version.as_ref());
        let mut x_heads = x.lv_list_to_remote(x.version.as_ref());
        y_heads.sort_by(|p, q| p.agent.cmp(&q.agent).then(p.seq.cmp(&q.seq)));
        x_heads.sort_by(|p, q| p.agent.cmp(&q.agent).then(p.seq.cmp(&q.seq)));
        assert_eq!(y_heads, x_heads);

        // Merging again is a no-op.
        let again = y.merge_graph(&x).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn merge_graph_commutes_modulo_reordering() {
        // Two peers sharing a prefix, then diverging.
        let mut p1 = CausalGraph::new();
        let a = p1.get_or_create_agent_id("a");
        p1.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });

        let mut p2 = p1.clone();
        let b = p2.get_or_create_agent_id("b");
        p1.assign_local_op(a, 2);
        p2.assign_local_op(b, 3);

        p1.merge_graph(&p2).unwrap();
        p2.merge_graph(&p1).unwrap();

        p1.dbg_check(true);
        p2.dbg_check(true);

        // Same public heads and same known changes; LVs may differ.
        assert_eq!(p1, p2);
        assert_eq!(p1.summarize(), p2.summarize());
    }

    #[test]
    fn serialize_from_version_sends_missing_suffix() {
        let mut x = merged_peer();
        let mut y = x.clone();
        let a = x.get_or_create_agent_id("a");
        x.assign_local_op(a, 3);

        let delta = x.serialize_from_version_v3(&[4]);
        assert_eq!(delta.entries.len(), 1);
        y.merge_serialized_v3(&delta).unwrap();
        assert_eq!(y, x);
    }

    #[test]
    fn advance_version_without_inserting() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });
        let old_version = cg.version.clone();

        let b = cg.get_or_create_agent_id("b");
        cg.merge_and_assign(&[], AgentSpan { agent: b, seq_range: (0..2).into() });
        cg.merge_and_assign(&[1, 3], AgentSpan { agent: a, seq_range: (2..3).into() });

        // A delta carrying what happened since old_version, already merged
        // here. Advancing the old frontier over it lands on the current
        // version without touching the graph.
        let delta = cg.serialize_from_version_v2(old_version.as_ref());
        let advanced = cg
            .advance_version_from_serialized_v2(&delta, old_version)
            .unwrap();
        assert_eq!(advanced, cg.version);
    }
}

//! The parents half of the causal graph: for every local version, which
//! versions came immediately before it.

pub mod tools;
mod check;

use crate::frontier::debug_assert_frontier_sorted;
use crate::rle::{HasLength, MergableSpan, RleKeyed, RleVec, SplitableSpan};
use crate::{Frontier, LVRange, LV};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A run of changes with a single linear parent chain.
///
/// `parents` names the parents of the *first* version in the span. Every
/// subsequent version's sole parent is its predecessor. The parents list
/// contains:
/// - nothing when the run sits at the root of history,
/// - one version for a plain sequential change,
/// - two or more when the first change in the run is a merge.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GraphEntry {
    pub span: LVRange,
    pub parents: Frontier,
}

impl GraphEntry {
    pub fn contains(&self, v: LV) -> bool {
        self.span.contains(v)
    }

    pub fn clone_parents_at_version(&self, v: LV) -> Frontier {
        if v > self.span.start {
            Frontier::new_1(v - 1)
        } else {
            self.parents.clone()
        }
    }
}

impl HasLength for GraphEntry {
    fn len(&self) -> usize {
        self.span.len()
    }
}

impl MergableSpan for GraphEntry {
    fn can_append(&self, other: &Self) -> bool {
        self.span.can_append(&other.span)
            && other.parents.len() == 1
            && other.parents[0] == self.span.last()
    }

    fn append(&mut self, other: Self) {
        self.span.append(other.span);
    }

    fn prepend(&mut self, other: Self) {
        self.span.prepend(other.span);
        self.parents = other.parents;
    }
}

impl SplitableSpan for GraphEntry {
    fn truncate(&mut self, at: usize) -> Self {
        debug_assert!(at >= 1);
        GraphEntry {
            span: self.span.truncate(at),
            parents: Frontier::new_1(self.span.start + at - 1),
        }
    }
}

impl RleKeyed for GraphEntry {
    fn rle_key(&self) -> usize {
        self.span.start
    }
}

/// The full parents structure: a packed RLE list of [`GraphEntry`] runs
/// covering local versions `0..len` with no gaps.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Graph {
    pub(crate) entries: RleVec<GraphEntry>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from entries in LV order, re-merging as it goes.
    pub fn from_entries(entries: &[GraphEntry]) -> Self {
        let mut graph = Self::new();
        for e in entries {
            graph.push(e.parents.as_ref(), e.span);
        }
        graph
    }

    pub fn num_entries(&self) -> usize {
        self.entries.num_entries()
    }

    pub fn len(&self) -> usize {
        self.entries.end()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a run of changes with the given parents. Extends the last
    /// entry when the new run follows it linearly.
    pub(crate) fn push(&mut self, parents: &[LV], range: LVRange) {
        debug_assert_eq!(range.start, self.len());
        debug_assert_frontier_sorted(parents);

        self.entries.push(GraphEntry {
            span: range,
            parents: Frontier::from_sorted(parents),
        });
    }

    /// The run containing `v`. Panics when `v` is out of range.
    pub(crate) fn entry_containing(&self, v: LV) -> &GraphEntry {
        self.entries.find_packed(v)
    }

    pub fn parents_at(&self, v: LV) -> Frontier {
        self.entry_containing(v).clone_parents_at_version(v)
    }

    /// Iterate entries intersecting `range`, clipped to it. Entries clipped
    /// at the front report a single linear parent, as per the entry contract.
    pub fn iter_range(&self, range: LVRange) -> impl Iterator<Item = GraphEntry> + '_ {
        self.entries.iter_range(range)
    }
}

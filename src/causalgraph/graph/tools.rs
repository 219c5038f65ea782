//! Tools for interrogating the time DAG: diffs between branches, version
//! containment, dominators and conflict scans.
//!
//! Every algorithm here runs the same basic machine: a max-heap of local
//! versions, always popping the highest outstanding version and consuming the
//! whole run containing it in one step. Since runs are often long, this
//! traverses the graph far faster than walking versions one at a time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use smallvec::{smallvec, SmallVec};

use crate::error::CgError;
use crate::frontier::debug_assert_frontier_sorted;
use crate::rle::{AppendRle, SplitableSpan};
use crate::{Frontier, Graph, LVRange, LV};

use DiffFlag::*;

/// Tags heap entries by which side of a diff reached them. The discriminant
/// order doesn't affect the heap order - ties on version are resolved by
/// merging flags.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiffFlag {
    OnlyA,
    OnlyB,
    Shared,
}

/// `(ranges only in a, ranges only in b)`, each sorted ascending and
/// RLE-merged.
pub type DiffResult = (SmallVec<[LVRange; 4]>, SmallVec<[LVRange; 4]>);

impl Graph {
    /// Does the run containing `a` also contain `b`? A cheap sufficient (not
    /// necessary) test for "a comes after b".
    pub(crate) fn is_direct_descendant_coarse(&self, a: LV, b: LV) -> bool {
        a == b || (a > b && self.entry_containing(a).contains(b))
    }

    /// Does `frontier` transitively contain (dominate) `target`?
    pub fn version_contains(&self, frontier: &[LV], target: LV) -> bool {
        if frontier.contains(&target) {
            return true;
        }
        if frontier.is_empty() {
            return false;
        }

        // Walk from the frontier down towards the roots, ignoring anything at
        // or below target. Any version below target can't be its descendant.
        let mut queue: BinaryHeap<LV> = BinaryHeap::new();
        for &v in frontier {
            if v > target {
                queue.push(v);
            }
        }

        while let Some(v) = queue.pop() {
            debug_assert!(v > target);

            let e = self.entry_containing(v);
            if e.span.start <= target {
                // target is inside this run, below v. Reached.
                return true;
            }

            // Anything else queued within this run tells us nothing new.
            while let Some(&next) = queue.peek() {
                if next >= e.span.start {
                    queue.pop();
                } else {
                    break;
                }
            }

            for &p in e.parents.iter() {
                #[allow(clippy::comparison_chain)]
                if p == target {
                    return true;
                } else if p > target {
                    queue.push(p);
                }
            }
        }

        false
    }

    /// Causally order two distinct versions.
    ///
    /// Returns `Some(Greater)` when `a` comes after (contains) `b`,
    /// `Some(Less)` when `b` comes after `a`, and `None` when the versions
    /// are concurrent. Passing the same version twice is a caller error.
    pub fn version_cmp(&self, a: LV, b: LV) -> Result<Option<Ordering>, CgError> {
        match a.cmp(&b) {
            Ordering::Equal => Err(CgError::InvalidArgument),
            Ordering::Less => Ok(if self.version_contains(&[b], a) {
                Some(Ordering::Less)
            } else {
                None
            }),
            Ordering::Greater => Ok(if self.version_contains(&[a], b) {
                Some(Ordering::Greater)
            } else {
                None
            }),
        }
    }

    /// Which versions are reachable from `a` but not `b`, and vice versa?
    ///
    /// Returns `(a_only, b_only)` as ascending, RLE-merged range lists.
    /// Versions reachable from both frontiers appear in neither.
    pub fn diff(&self, a: &[LV], b: &[LV]) -> DiffResult {
        debug_assert_frontier_sorted(a);
        debug_assert_frontier_sorted(b);

        // Simple short circuits first; most calls hit one of these.
        if a == b {
            return (smallvec![], smallvec![]);
        }

        if a.len() == 1 && b.len() == 1 {
            let a = a[0];
            let b = b[0];

            if self.is_direct_descendant_coarse(a, b) {
                return (smallvec![(b + 1..a + 1).into()], smallvec![]);
            }
            if self.is_direct_descendant_coarse(b, a) {
                return (smallvec![], smallvec![(a + 1..b + 1).into()]);
            }
        }

        self.diff_slow(a, b)
    }

    fn diff_slow(&self, a: &[LV], b: &[LV]) -> DiffResult {
        let mut only_a: SmallVec<[LVRange; 4]> = smallvec![];
        let mut only_b: SmallVec<[LVRange; 4]> = smallvec![];

        // Marks [start..=last] with the given flag. The traversal runs high
        // to low, so the ranges arrive in descending order.
        let mark_run = |start: LV, last: LV, flag: DiffFlag| {
            let target = match flag {
                OnlyA => &mut only_a,
                OnlyB => &mut only_b,
                Shared => return,
            };
            target.push_reversed_rle(LVRange::new(start, last + 1));
        };

        self.diff_slow_internal(a, b, mark_run);

        only_a.reverse();
        only_b.reverse();
        (only_a, only_b)
    }

    fn diff_slow_internal<F>(&self, a: &[LV], b: &[LV], mut mark_run: F)
    where
        F: FnMut(LV, LV, DiffFlag),
    {
        let mut queue: BinaryHeap<(LV, DiffFlag)> = BinaryHeap::new();
        for &v in a {
            queue.push((v, OnlyA));
        }
        for &v in b {
            queue.push((v, OnlyB));
        }

        let mut num_shared_entries = 0;

        while let Some((mut v, mut flag)) = queue.pop() {
            if flag == Shared {
                num_shared_entries -= 1;
            }

            // Merge duplicate heap entries for this version, upgrading the
            // flag to Shared when both sides reached it.
            while let Some((peek_v, peek_flag)) = queue.peek() {
                if *peek_v != v {
                    break;
                }
                if *peek_flag != flag {
                    flag = Shared;
                }
                if *peek_flag == Shared {
                    num_shared_entries -= 1;
                }
                queue.pop();
            }

            let e = self.entry_containing(v);

            // Two cases: either the next queued item also lands inside this
            // run (mark down to it and merge flags), or it doesn't (mark the
            // rest of the run and queue the run's parents).
            while let Some((peek_v, peek_flag)) = queue.peek() {
                if *peek_v < e.span.start {
                    break;
                }
                if *peek_flag != flag {
                    // Emit the partial run above the peeked version, then
                    // continue from it with a merged flag.
                    mark_run(*peek_v + 1, v, flag);
                    v = *peek_v;
                    flag = Shared;
                }
                if *peek_flag == Shared {
                    num_shared_entries -= 1;
                }
                queue.pop();
            }

            mark_run(e.span.start, v, flag);

            for &p in e.parents.iter() {
                queue.push((p, flag));
                if flag == Shared {
                    num_shared_entries += 1;
                }
            }

            // Once everything outstanding is shared, nothing more can end up
            // in either output.
            if queue.len() == num_shared_entries {
                break;
            }
        }
    }
}

impl Graph {
    /// Given a set of versions, find the subset which dominates the rest:
    /// the smallest subset from which every input version is reachable.
    ///
    /// Inputs must be sorted ascending. Returns a frontier (ascending).
    pub fn find_dominators(&self, versions: &[LV]) -> Frontier {
        debug_assert_frontier_sorted(versions);
        let mut result_rev = self.find_dominators_rev(versions);
        result_rev.reverse();
        Frontier(result_rev)
    }

    fn find_dominators_rev(&self, versions: &[LV]) -> SmallVec<[LV; 2]> {
        if versions.len() <= 1 {
            return versions.into();
        }

        let mut result_rev = smallvec![];
        self.find_dominators_full(versions.iter().copied(), |v, is_dom| {
            if is_dom {
                result_rev.push(v);
            }
        });

        result_rev
    }

    /// As [`find_dominators`](Graph::find_dominators) for unsorted inputs,
    /// possibly containing duplicates. Duplicates count once.
    pub fn find_dominators_unsorted(&self, versions: &[LV]) -> Frontier {
        if versions.len() <= 1 {
            return Frontier::from_sorted(versions);
        }

        let mut result_rev: SmallVec<[LV; 2]> = smallvec![];
        self.find_dominators_full(versions.iter().copied(), |v, is_dom| {
            if is_dom {
                result_rev.push(v);
            }
        });
        result_rev.reverse();
        Frontier(result_rev)
    }

    /// Visit every input version, highest first, labelled true when it
    /// dominates the input set and false when some other input reaches it.
    ///
    /// The first time an input pops off the heap nothing above it has
    /// reached it, so nothing later-popped can dominate it; inputs reached
    /// from above during a run-drain are dominated.
    pub fn find_dominators_full<F, I>(&self, versions_iter: I, mut visit: F)
    where
        F: FnMut(LV, bool),
        I: Iterator<Item = LV>,
    {
        if let Some(max_size) = versions_iter.size_hint().1 {
            if max_size <= 1 {
                for v in versions_iter {
                    visit(v, true);
                }
                return;
            }
        }

        // The LSB marks whether this heap entry is an input to the function
        // or a parent found during traversal. At the same version, traversal
        // entries sort above inputs, so an input reached from above is
        // drained (as a non-dominator) before it can pop as a dominator.
        fn enc_input(v: LV) -> usize {
            v << 1
        }
        fn enc_parent(v: LV) -> usize {
            (v << 1) + 1
        }
        fn dec(v_enc: usize) -> (bool, LV) {
            (v_enc % 2 == 0, v_enc >> 1)
        }

        let mut queue: BinaryHeap<usize> = versions_iter
            .map(|v| {
                assert!(v < usize::MAX / 2, "version too large");
                enc_input(v)
            })
            .collect();
        let mut inputs_remaining = queue.len();

        let mut last_emitted = usize::MAX;

        while let Some(v_enc) = queue.pop() {
            let (is_input, v) = dec(v_enc);

            if is_input {
                visit(v, true);
                last_emitted = v;
                inputs_remaining -= 1;
            }

            let e = self.entry_containing(v);

            while let Some(&v2_enc) = queue.peek() {
                let (is_input2, v2) = dec(v2_enc);
                if v2 < e.span.start {
                    break;
                }
                queue.pop();

                if is_input2 {
                    // Reached from above: not a dominator. Duplicate inputs
                    // are emitted only once.
                    if last_emitted != v2 {
                        visit(v2, false);
                        last_emitted = v2;
                    }
                    inputs_remaining -= 1;
                }
            }

            if inputs_remaining == 0 {
                break;
            }

            for &p in e.parents.iter() {
                queue.push(enc_parent(p));
            }
        }
    }

    /// A version which contains all operations in both `a` and `b`.
    pub fn version_union(&self, a: &[LV], b: &[LV]) -> Frontier {
        let mut result_rev: SmallVec<[LV; 2]> = smallvec![];
        self.find_dominators_full(a.iter().copied().chain(b.iter().copied()), |v, is_dom| {
            if is_dom {
                result_rev.push(v);
            }
        });
        result_rev.reverse();
        Frontier(result_rev)
    }
}

impl Graph {
    /// Find the operation ranges which might be concurrent with each other,
    /// walking both branches back to a single common point in time.
    ///
    /// `visit` is called with each span touched on the way down (tagged by
    /// which branch it belongs to, or [`DiffFlag::Shared`] for both), in
    /// descending order. Returns the common ancestor frontier.
    pub fn find_conflicting<V>(&self, a: &[LV], b: &[LV], mut visit: V) -> Frontier
    where
        V: FnMut(LVRange, DiffFlag),
    {
        // Simple short circuits, as for diff.
        if a == b {
            return Frontier::from_sorted(a);
        }

        if a.len() == 1 && b.len() == 1 {
            let a = a[0];
            let b = b[0];

            if self.is_direct_descendant_coarse(a, b) {
                visit((b + 1..a + 1).into(), OnlyA);
                return Frontier::new_1(b);
            }
            if self.is_direct_descendant_coarse(b, a) {
                visit((a + 1..b + 1).into(), OnlyB);
                return Frontier::new_1(a);
            }
        }

        self.find_conflicting_slow(a, b, visit)
    }

    pub(crate) fn find_conflicting_slow<V>(&self, a: &[LV], b: &[LV], mut visit: V) -> Frontier
    where
        V: FnMut(LVRange, DiffFlag),
    {
        // Each heap entry is a whole point in time: a frontier, stored as its
        // highest member plus the rest. The root frontier is represented with
        // last == usize::MAX; the wrapping_add in the comparator sends it to
        // the bottom of the heap so every real version pops first.
        #[derive(Debug, PartialEq, Eq, Clone)]
        struct TimePoint {
            last: LV,
            merged_with: SmallVec<[LV; 1]>, // Always sorted. Usually empty.
        }

        impl Ord for TimePoint {
            #[inline(always)]
            fn cmp(&self, other: &Self) -> Ordering {
                self.last
                    .wrapping_add(1)
                    .cmp(&other.last.wrapping_add(1))
                    .then_with(|| other.merged_with.is_empty().cmp(&self.merged_with.is_empty()))
            }
        }

        impl PartialOrd for TimePoint {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl From<LV> for TimePoint {
            fn from(v: LV) -> Self {
                Self { last: v, merged_with: smallvec![] }
            }
        }

        impl From<&[LV]> for TimePoint {
            fn from(version: &[LV]) -> Self {
                Self {
                    last: *version.last().unwrap_or(&usize::MAX),
                    merged_with: if version.len() > 1 {
                        SmallVec::from_slice(&version[..version.len() - 1])
                    } else {
                        smallvec![]
                    },
                }
            }
        }

        let mut queue: BinaryHeap<(TimePoint, DiffFlag)> = BinaryHeap::new();
        queue.push((a.into(), OnlyA));
        queue.push((b.into(), OnlyB));

        // Loop until we've collapsed the graph down to a single element.
        'outer: loop {
            let (time, mut flag) = queue.pop().unwrap();
            let t = time.last;

            if t == usize::MAX {
                break Frontier::root();
            }

            // Discard duplicate entries, merging their flags.
            while let Some((peek_time, peek_flag)) = queue.peek() {
                if *peek_time != time {
                    break;
                }
                if *peek_flag != flag {
                    flag = Shared;
                }
                queue.pop();
            }

            if queue.is_empty() {
                // Everything merged down to this one time point.
                let mut frontier = Frontier::from_sorted(time.merged_with.as_slice());
                frontier.0.push(t);
                debug_assert_frontier_sorted(frontier.as_ref());
                break frontier;
            }

            // If this node is a merger, shatter it: the other members get
            // requeued as singletons and t is handled now.
            if !time.merged_with.is_empty() {
                for t in time.merged_with {
                    queue.push((t.into(), flag));
                }
            }

            let e = self.entry_containing(t);
            let mut range = LVRange { start: e.span.start, end: t + 1 };

            // Consume all other queued items within this run.
            loop {
                if let Some((peek_time, _)) = queue.peek() {
                    if peek_time.last != usize::MAX && peek_time.last >= e.span.start {
                        // The next item is within this run. Consume it.
                        let (time, next_flag) = queue.pop().unwrap();

                        // Only emit inner items when they aren't duplicates.
                        // +1 to exclude the merge point itself.
                        if time.last + 1 < range.end {
                            let offset = time.last + 1 - e.span.start;
                            debug_assert!(offset > 0);
                            let rem = range.truncate(offset);
                            visit(rem, flag);
                        }

                        if next_flag != flag {
                            flag = Shared;
                        }

                        if !time.merged_with.is_empty() {
                            // A merger using part of this entry. Shatter it;
                            // its top member is where we already are.
                            for t in time.merged_with {
                                queue.push((t.into(), next_flag));
                            }
                        }
                    } else {
                        // Emit the remainder of this run and stop at its
                        // parents, pushing a merge point so the loop halts
                        // there.
                        visit(range, flag);
                        queue.push((e.parents.as_ref().into(), flag));
                        break;
                    }
                } else {
                    break 'outer Frontier::new_1(range.last());
                }
            }
        }
    }

    /// Find the conflicting spans, collected instead of visited.
    #[allow(unused)]
    pub(crate) fn find_conflicting_simple(&self, a: &[LV], b: &[LV]) -> ConflictZone {
        let mut spans = smallvec![];
        let common_ancestor = self.find_conflicting(a, b, |span, _flag| {
            spans.push_reversed_rle(span);
        });
        spans.reverse();

        ConflictZone { common_ancestor, spans }
    }
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) struct ConflictZone {
    pub(crate) common_ancestor: Frontier,
    pub(crate) spans: SmallVec<[LVRange; 4]>,
}

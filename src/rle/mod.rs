//! The span vocabulary underpinning every index in this crate.
//!
//! A *span* is an entry which compactly represents a run of consecutive
//! items - a range of local versions, a run of sequence numbers from one
//! agent, and so on. Spans can be split apart and merged back together, and
//! [`RleVec`] stores a sorted list of them, searchable by key.

use std::fmt::Debug;

use smallvec::{Array, SmallVec};

mod merge_iter;
pub mod rle_vec;

pub use merge_iter::{MergeIter, MergeableIterator};
pub use rle_vec::RleVec;

use crate::LVRange;

/// The number of items a span covers.
pub trait HasLength {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A span which can be cut into two pieces, each preserving its half of the
/// run.
pub trait SplitableSpan: Clone {
    /// Truncate the span at `at`, keeping items `0..at` and returning the
    /// jettisoned remainder (`at..len`).
    ///
    /// `at` must strictly obey `0 < at < self.len()`.
    fn truncate(&mut self, at: usize) -> Self;

    /// The inverse of [`truncate`](SplitableSpan::truncate): keep items
    /// `at..len` in self, returning `0..at`.
    #[inline(always)]
    fn truncate_keeping_right(&mut self, at: usize) -> Self {
        let mut other = self.clone();
        *self = other.truncate(at);
        other
    }
}

/// A span which can be fused with an adjacent span.
pub trait MergableSpan: Clone {
    /// Can `other` be appended to the end of self? `can_append` is always
    /// consulted immediately before [`append`](MergableSpan::append); a
    /// failed check must leave both spans untouched.
    fn can_append(&self, other: &Self) -> bool;

    /// `self = self + other`. Only valid when `self.can_append(&other)`.
    fn append(&mut self, other: Self);

    /// `self = other + self`. Only valid when `other.can_append(self)`.
    #[inline(always)]
    fn prepend(&mut self, mut other: Self) {
        other.append(self.clone());
        *self = other;
    }
}

/// Spans containing individually addressable items.
pub trait Searchable {
    type Item: Copy + Debug;

    /// If the span contains `item`, return its offset within the span.
    fn get_offset(&self, item: Self::Item) -> Option<usize>;

    /// The item at the given offset. `offset` must be within the span.
    fn at_offset(&self, offset: usize) -> Self::Item;
}

/// Spans sorted and searched by an integer key.
pub trait RleKeyed {
    fn rle_key(&self) -> usize;
}

pub trait RleSpanHelpers: RleKeyed + HasLength {
    /// One past the last key this span covers.
    fn end(&self) -> usize {
        self.rle_key() + self.len()
    }

    fn span(&self) -> LVRange {
        let start = self.rle_key();
        LVRange { start, end: start + self.len() }
    }
}

impl<V: RleKeyed + HasLength> RleSpanHelpers for V {}

/// A span keyed at an arbitrary position. The key advances in lockstep with
/// the value when the pair is split or merged.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KVPair<V>(pub usize, pub V);

impl<V> RleKeyed for KVPair<V> {
    fn rle_key(&self) -> usize {
        self.0
    }
}

impl<V: HasLength> HasLength for KVPair<V> {
    fn len(&self) -> usize {
        self.1.len()
    }
}

impl<V: SplitableSpan + HasLength> SplitableSpan for KVPair<V> {
    fn truncate(&mut self, at: usize) -> Self {
        let remainder = self.1.truncate(at);
        KVPair(self.0 + at, remainder)
    }

    fn truncate_keeping_right(&mut self, at: usize) -> Self {
        let old_key = self.0;
        self.0 += at;
        let trimmed = self.1.truncate_keeping_right(at);
        KVPair(old_key, trimmed)
    }
}

impl<V: MergableSpan + HasLength> MergableSpan for KVPair<V> {
    fn can_append(&self, other: &Self) -> bool {
        other.0 == self.end() && self.1.can_append(&other.1)
    }

    fn append(&mut self, other: Self) {
        self.1.append(other.1);
    }

    fn prepend(&mut self, other: Self) {
        self.1.prepend(other.1);
        self.0 = other.0;
    }
}

impl<V: Searchable> Searchable for KVPair<V> {
    type Item = V::Item;

    fn get_offset(&self, item: Self::Item) -> Option<usize> {
        self.1.get_offset(item)
    }

    fn at_offset(&self, offset: usize) -> Self::Item {
        self.1.at_offset(offset)
    }
}

impl<V: Default> Default for KVPair<V> {
    fn default() -> Self {
        KVPair(0, V::default())
    }
}

/// Push-with-merge for list-like containers.
pub trait AppendRle<T: MergableSpan> {
    /// Push an item, fusing it into the current last item when possible.
    /// Returns true if the item was merged, false if it was pushed new.
    fn push_rle(&mut self, item: T) -> bool;

    /// Push to a list sorted in *reverse* order: the new item is merged in
    /// front of the last item when possible.
    fn push_reversed_rle(&mut self, item: T) -> bool;
}

impl<T: MergableSpan> AppendRle<T> for Vec<T> {
    fn push_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if v.can_append(&item) {
                v.append(item);
                return true;
            }
        }

        self.push(item);
        false
    }

    fn push_reversed_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if item.can_append(v) {
                v.prepend(item);
                return true;
            }
        }

        self.push(item);
        false
    }
}

impl<T: MergableSpan, A: Array<Item = T>> AppendRle<T> for SmallVec<A> {
    fn push_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if v.can_append(&item) {
                v.append(item);
                return true;
            }
        }

        self.push(item);
        false
    }

    fn push_reversed_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if item.can_append(v) {
                v.prepend(item);
                return true;
            }
        }

        self.push(item);
        false
    }
}

/// Check an implementation of [`SplitableSpan`] + [`MergableSpan`] obeys the
/// round-trip law: splitting a span anywhere and fusing the halves back
/// together must reproduce the original exactly.
pub fn test_splitable_methods_valid<E>(entry: E)
where
    E: SplitableSpan + MergableSpan + HasLength + Debug + Eq,
{
    assert!(entry.len() >= 2, "call this with a larger entry");

    for i in 1..entry.len() {
        let mut start = entry.clone();
        let end = start.truncate(i);

        assert_eq!(start.len(), i);
        assert_eq!(end.len(), entry.len() - i);

        assert!(start.can_append(&end));

        let mut merge_append = start.clone();
        merge_append.append(end.clone());
        assert_eq!(merge_append, entry);

        let mut merge_prepend = end.clone();
        merge_prepend.prepend(start.clone());
        assert_eq!(merge_prepend, entry);

        // truncate_keeping_right must agree with truncate.
        let mut end2 = entry.clone();
        let start2 = end2.truncate_keeping_right(i);
        assert_eq!(end2, end);
        assert_eq!(start2, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kvpair_splits() {
        test_splitable_methods_valid(KVPair(10, LVRange::new(100, 105)));
    }

    #[test]
    fn push_rle_merges() {
        let mut list: Vec<LVRange> = vec![];
        assert!(!list.push_rle((0..5).into()));
        assert!(list.push_rle((5..8).into()));
        assert!(!list.push_rle((10..11).into()));
        assert_eq!(list, vec![(0..8).into(), (10..11).into()]);
    }

    #[test]
    fn push_reversed_rle_merges() {
        let mut list: Vec<LVRange> = vec![];
        list.push_reversed_rle((5..8).into());
        list.push_reversed_rle((0..5).into());
        assert_eq!(list, vec![(0..8).into()]);
    }
}

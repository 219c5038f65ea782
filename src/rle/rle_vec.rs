use std::cmp::Ordering::*;
use std::ops::Index;
use std::slice::SliceIndex;

use crate::error::CgError;
use crate::rle::{HasLength, MergableSpan, RleKeyed, RleSpanHelpers, Searchable, SplitableSpan};
use crate::LVRange;

/// A run-length encoded list of spans, sorted by key.
///
/// Each entry covers `rle_key()..rle_key() + len()`. Appends which extend the
/// last entry are fused into it, so the list stays maximally packed for
/// append-dominant workloads. Lists may be *packed* (no gaps between entries,
/// like the causal graph's entry list) or *sparse* (gaps allowed, like an
/// agent's seq index).
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RleVec<V: HasLength + MergableSpan + Sized>(pub Vec<V>);

impl<V: HasLength + MergableSpan + Sized> RleVec<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a new span to the end of the list, fusing it into the last
    /// entry when possible. Returns true if the item was merged.
    pub fn push(&mut self, val: V) -> bool {
        if let Some(last) = self.0.last_mut() {
            if last.can_append(&val) {
                last.append(val);
                return true;
            }
        }

        self.0.push(val);
        false
    }

    pub fn last_entry(&self) -> Option<&V> {
        self.0.last()
    }

    pub fn num_entries(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.0.iter()
    }

    /// One past the highest key covered by the list.
    pub fn end(&self) -> usize
    where
        V: RleKeyed,
    {
        if let Some(v) = self.last_entry() {
            v.end()
        } else {
            0
        }
    }
}

impl<V: HasLength + MergableSpan + RleKeyed + Sized> RleVec<V> {
    /// Binary search for the entry containing `needle`. When the needle
    /// isn't covered, returns `Err` with the index at which an entry
    /// containing it would be inserted.
    pub fn find_index(&self, needle: usize) -> Result<usize, usize> {
        self.0.binary_search_by(|entry| {
            let key = entry.rle_key();
            if needle < key {
                Greater
            } else if needle >= key + entry.len() {
                Less
            } else {
                Equal
            }
        })
    }

    /// The index of the entry containing `needle`, or of the next entry
    /// after it.
    pub fn find_next_index(&self, needle: usize) -> usize {
        self.find_index(needle).unwrap_or_else(|i| i)
    }

    pub fn find(&self, needle: usize) -> Option<&V> {
        self.find_index(needle).ok().map(|idx| &self.0[idx])
    }

    /// As [`find`](RleVec::find), for lists with no gaps. Panics when the
    /// needle is out of range.
    pub fn find_packed(&self, needle: usize) -> &V {
        self.find(needle).unwrap()
    }

    /// Find the entry containing `needle`, returning it together with the
    /// needle's offset inside the entry.
    pub fn find_with_offset(&self, needle: usize) -> Option<(&V, usize)> {
        self.find_index(needle).ok().map(|idx| {
            let entry = &self.0[idx];
            (entry, needle - entry.rle_key())
        })
    }

    pub fn find_packed_with_offset(&self, needle: usize) -> (&V, usize) {
        self.find_with_offset(needle).unwrap()
    }

    /// Like [`find_with_offset`](RleVec::find_with_offset), except misses
    /// return the surrounding gap instead of `None`: `(Err(gap), offset into
    /// the gap)`. The gap's end is `usize::MAX` past the last entry.
    pub fn find_sparse(&self, needle: usize) -> (Result<&V, LVRange>, usize) {
        match self.find_index(needle) {
            Ok(idx) => {
                let entry = &self.0[idx];
                (Ok(entry), needle - entry.rle_key())
            }
            Err(idx) => {
                let next_key = if let Some(entry) = self.0.get(idx) {
                    entry.rle_key()
                } else {
                    usize::MAX
                };

                if idx == 0 {
                    (Err((0..next_key).into()), needle)
                } else {
                    let gap_start = self.0[idx - 1].end();
                    (Err((gap_start..next_key).into()), needle - gap_start)
                }
            }
        }
    }

    /// Iterate over the entries intersecting `range`, by reference and
    /// without clipping: the first and last yielded entries may extend
    /// beyond the range.
    pub fn iter_range_unclipped(&self, range: LVRange) -> impl Iterator<Item = &V> + '_ {
        let start_idx = self.find_next_index(range.start);
        self.0[start_idx..]
            .iter()
            .take_while(move |e| e.rle_key() < range.end)
    }

    /// Insert a span, maintaining sort order. Usually appends; mid-list
    /// inserts are O(n) and fail with [`CgError::AlreadyExists`] when the
    /// span overlaps an existing entry.
    pub fn insert(&mut self, val: V) -> Result<(), CgError> {
        // Data almost always lands at the end. Check that case first.
        if self
            .last_entry()
            .map(|last| last.end() <= val.rle_key())
            .unwrap_or(true)
        {
            self.push(val);
            return Ok(());
        }

        let idx = match self.find_index(val.rle_key()) {
            Ok(_) => return Err(CgError::AlreadyExists),
            Err(idx) => idx,
        };
        if idx < self.0.len() && val.rle_key() + val.len() > self.0[idx].rle_key() {
            return Err(CgError::AlreadyExists);
        }

        self.insert_at_idx(idx, val);
        Ok(())
    }

    /// Splice `val` in at `idx`, fusing it with either (or both) neighbours.
    /// The caller vouches that the span fits in the gap at `idx`.
    pub(crate) fn insert_at_idx(&mut self, idx: usize, val: V) {
        debug_assert!(idx == 0 || self.0[idx - 1].end() <= val.rle_key());
        debug_assert!(idx >= self.0.len() || val.rle_key() + val.len() <= self.0[idx].rle_key());

        if idx >= 1 {
            let prev = &mut self.0[idx - 1];
            if prev.can_append(&val) {
                prev.append(val);

                // The extended entry might now abut its right neighbour.
                if idx < self.0.len() && self.0[idx - 1].can_append(&self.0[idx]) {
                    let next = self.0.remove(idx);
                    self.0[idx - 1].append(next);
                }
                return;
            }
        }

        if idx < self.0.len() {
            let next = &mut self.0[idx];
            if val.can_append(next) {
                next.prepend(val);
                return;
            }
        }

        self.0.insert(idx, val);
    }

    /// Panic unless the list is contiguous from key 0.
    pub(crate) fn check_packed_from_0(&self) {
        let mut expect_next = 0;
        for entry in self.0.iter() {
            assert_eq!(entry.rle_key(), expect_next);
            expect_next = entry.end();
        }
    }

    /// Panic unless the list is sorted with no overlaps.
    pub(crate) fn check_ordered(&self) {
        let mut last_end = 0;
        for (i, entry) in self.0.iter().enumerate() {
            assert!(entry.len() > 0, "entry {} is empty", i);
            assert!(i == 0 || entry.rle_key() >= last_end, "entry {} overlaps", i);
            last_end = entry.end();
        }
    }

    /// Panic if any adjacent pair could still be merged.
    pub(crate) fn check_fully_merged(&self) {
        for i in 1..self.0.len() {
            assert!(!self.0[i - 1].can_append(&self.0[i]));
        }
    }
}

impl<V: HasLength + MergableSpan + RleKeyed + SplitableSpan + Sized> RleVec<V> {
    /// Iterate over every span intersecting `range`, cloning and truncating
    /// the boundary spans so that each yielded span lies entirely inside the
    /// range.
    pub fn iter_range(&self, range: LVRange) -> RleVecRangeIter<'_, V> {
        let start_idx = self.find_next_index(range.start);

        RleVecRangeIter {
            inner: self.0[start_idx..].iter(),
            range,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RleVecRangeIter<'a, V> {
    inner: std::slice::Iter<'a, V>,
    range: LVRange,
}

impl<'a, V: HasLength + RleKeyed + SplitableSpan> Iterator for RleVecRangeIter<'a, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;

        let item_range = item.span();
        debug_assert!(item_range.end > self.range.start);
        if item_range.start >= self.range.end {
            return None;
        }

        let mut item = item.clone();
        if item_range.end > self.range.end {
            item.truncate(self.range.end - item_range.start);
        }
        if item_range.start < self.range.start {
            item.truncate_keeping_right(self.range.start - item_range.start);
        }
        Some(item)
    }
}

impl<V: HasLength + MergableSpan + RleKeyed + Searchable> RleVec<V> {
    /// Look up the single item at position `needle`.
    pub fn get(&self, needle: usize) -> V::Item {
        let (v, offset) = self.find_packed_with_offset(needle);
        v.at_offset(offset)
    }
}

impl<V: HasLength + MergableSpan + Sized> FromIterator<V> for RleVec<V> {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        let mut rle = Self::new();
        for item in iter {
            rle.push(item);
        }
        rle
    }
}

impl<V: HasLength + MergableSpan + Sized> Default for RleVec<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T: HasLength + MergableSpan, I: SliceIndex<[T]>> Index<I> for RleVec<T> {
    type Output = I::Output;

    #[inline]
    fn index(&self, index: I) -> &Self::Output {
        self.0.index(index)
    }
}

use std::fmt::{Debug, Formatter};
use std::ops::Range;

use crate::rle::{HasLength, MergableSpan, RleKeyed, Searchable, SplitableSpan};
use crate::LV;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A half-open range of local versions.
///
/// This is a stand-in for `Range<usize>`, which regrettably doesn't implement
/// `Copy`. Convert to and from `Range` with `.into()`. `LVRange` is itself a
/// span: splitting and merging it behaves as for any other RLE entry.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LVRange {
    pub start: LV,
    pub end: LV,
}

impl LVRange {
    #[inline]
    pub fn new(start: LV, end: LV) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn last(&self) -> LV {
        debug_assert!(!self.is_empty());
        self.end - 1
    }

    pub fn contains(&self, v: LV) -> bool {
        self.start <= v && v < self.end
    }

    pub fn is_empty(&self) -> bool {
        debug_assert!(self.start <= self.end);
        self.start == self.end
    }

    /// The overlap between two ranges, or `None` when they share no items.
    pub fn intersect(&self, other: &Self) -> Option<LVRange> {
        let result = LVRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        };
        if result.start < result.end {
            Some(result)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = LV> {
        Range::<usize>::from(*self)
    }
}

impl From<LV> for LVRange {
    fn from(start: LV) -> Self {
        LVRange { start, end: start + 1 }
    }
}

impl From<Range<usize>> for LVRange {
    fn from(range: Range<usize>) -> Self {
        LVRange { start: range.start, end: range.end }
    }
}

impl From<LVRange> for Range<usize> {
    fn from(span: LVRange) -> Self {
        span.start..span.end
    }
}

impl HasLength for LVRange {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

impl SplitableSpan for LVRange {
    fn truncate(&mut self, at: usize) -> Self {
        let split = self.start + at;
        let other = LVRange { start: split, end: self.end };
        self.end = split;
        other
    }

    #[inline]
    fn truncate_keeping_right(&mut self, at: usize) -> Self {
        let split = self.start + at;
        let other = LVRange { start: self.start, end: split };
        self.start = split;
        other
    }
}

impl MergableSpan for LVRange {
    fn can_append(&self, other: &Self) -> bool {
        other.start == self.end
    }

    fn append(&mut self, other: Self) {
        self.end = other.end;
    }

    fn prepend(&mut self, other: Self) {
        self.start = other.start;
    }
}

impl Searchable for LVRange {
    type Item = LV;

    fn get_offset(&self, v: LV) -> Option<usize> {
        if v >= self.start && v < self.end {
            Some(v - self.start)
        } else {
            None
        }
    }

    fn at_offset(&self, offset: usize) -> LV {
        self.start + offset
    }
}

impl RleKeyed for LVRange {
    fn rle_key(&self) -> usize {
        self.start
    }
}

impl Debug for LVRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

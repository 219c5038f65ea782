use std::fmt::{Debug, Formatter};
use std::ops::{Deref, Index};

use smallvec::{smallvec, SmallVec};

use crate::{LVRange, LV};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A frontier: the minimal set of versions which (transitively) covers some
/// set of changes.
///
/// Frontiers are stored sorted ascending with no duplicates. The empty
/// frontier is "root" - the state before any changes at all. Almost all
/// frontiers in practice contain a single element; concurrency adds more.
#[derive(Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frontier(pub SmallVec<[LV; 2]>);

/// Is the list sorted ascending with no duplicates?
pub(crate) fn frontier_is_sorted(f: &[LV]) -> bool {
    if f.len() >= 2 {
        let mut last = f[0];
        for &v in &f[1..] {
            if v <= last {
                return false;
            }
            last = v;
        }
    }
    true
}

pub(crate) fn debug_assert_frontier_sorted(f: &[LV]) {
    debug_assert!(frontier_is_sorted(f));
}

impl Frontier {
    pub fn root() -> Self {
        Self(smallvec![])
    }

    pub fn new_1(v: LV) -> Self {
        Self(smallvec![v])
    }

    /// The caller promises the slice is sorted ascending and deduplicated.
    pub fn from_sorted(f: &[LV]) -> Self {
        debug_assert_frontier_sorted(f);
        Self(f.into())
    }

    pub fn from_unsorted(f: &[LV]) -> Self {
        let mut result: SmallVec<[LV; 2]> = f.into();
        result.sort_unstable();
        result.dedup();
        Self(result)
    }

    pub fn from_unsorted_iter<I: Iterator<Item = LV>>(iter: I) -> Self {
        let mut result: SmallVec<[LV; 2]> = iter.collect();
        result.sort_unstable();
        result.dedup();
        Self(result)
    }

    pub fn as_ref(&self) -> &[LV] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Root is the frontier of a graph with no changes in it.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LV> {
        self.0.iter()
    }

    pub fn contains(&self, v: LV) -> bool {
        self.0.binary_search(&v).is_ok()
    }

    /// Insert a version, keeping the list sorted. The version must not
    /// already be present.
    pub(crate) fn insert_sorted(&mut self, v: LV) {
        // These lists are tiny; a linear scan would do just as well.
        let idx = self.0.binary_search(&v).unwrap_err();
        self.0.insert(idx, v);
        debug_assert_frontier_sorted(self.0.as_slice());
    }

    /// Advance the frontier over a run of changes with the given parents.
    ///
    /// Any frontier member which is a direct parent of the run is no longer a
    /// dominator, so it drops out; the run's last version takes its place.
    /// This is only valid when the entire run lies within one graph entry
    /// (linear parentage after the first change).
    pub fn advance_by_known_run(&mut self, parents: &[LV], span: LVRange) {
        debug_assert!(!span.is_empty());

        if parents.len() == 1 && self.0.len() == 1 && parents[0] == self.0[0] {
            // Fast path: time is just advancing linearly.
            self.0[0] = span.last();
            return;
        }

        debug_assert!(!self.0.contains(&span.start));
        debug_assert_frontier_sorted(self.0.as_slice());

        self.0.retain(|v| !parents.contains(v)); // Usually removes all elements.
        self.insert_sorted(span.last());
    }
}

impl Debug for Frontier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("F")?;
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl Deref for Frontier {
    type Target = [LV];

    fn deref(&self) -> &[LV] {
        self.0.as_slice()
    }
}

impl Index<usize> for Frontier {
    type Output = LV;

    fn index(&self, idx: usize) -> &LV {
        &self.0[idx]
    }
}

impl From<LV> for Frontier {
    fn from(v: LV) -> Self {
        Self::new_1(v)
    }
}

impl FromIterator<LV> for Frontier {
    /// Collecting sorts; the input need not arrive in order.
    fn from_iter<T: IntoIterator<Item = LV>>(iter: T) -> Self {
        Self::from_unsorted_iter(iter.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_checks() {
        assert!(frontier_is_sorted(&[]));
        assert!(frontier_is_sorted(&[0]));
        assert!(frontier_is_sorted(&[0, 2, 5]));
        assert!(!frontier_is_sorted(&[5, 2]));
        assert!(!frontier_is_sorted(&[2, 2]));
    }

    #[test]
    fn advance_linear() {
        let mut f = Frontier::root();
        f.advance_by_known_run(&[], (0..10).into());
        assert_eq!(f.as_ref(), &[9]);

        f.advance_by_known_run(&[9], (10..20).into());
        assert_eq!(f.as_ref(), &[19]);
    }

    #[test]
    fn advance_merges_and_splits() {
        // Two concurrent runs, then a merge of both.
        let mut f = Frontier::root();
        f.advance_by_known_run(&[], (0..2).into());
        f.advance_by_known_run(&[], (2..4).into());
        assert_eq!(f.as_ref(), &[1, 3]);

        f.advance_by_known_run(&[1, 3], (4..5).into());
        assert_eq!(f.as_ref(), &[4]);
    }

    #[test]
    fn from_unsorted_dedups() {
        assert_eq!(Frontier::from_unsorted(&[3, 1, 3]).as_ref(), &[1, 3]);
    }
}

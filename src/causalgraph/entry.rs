use crate::causalgraph::agent_span::AgentSpan;
use crate::rle::{HasLength, MergableSpan, SplitableSpan};
use crate::{Frontier, LVRange, LV};

/// One run of the causal graph, combining both indexes: a contiguous span of
/// local versions, the public identity span assigned to them, and the
/// parents of the run's first change. Subsequent changes in the run each
/// have their predecessor as sole parent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CGEntry {
    pub start: LV,
    pub parents: Frontier,
    pub span: AgentSpan,
}

impl Default for CGEntry {
    fn default() -> Self {
        CGEntry {
            start: 0,
            parents: Default::default(),
            span: AgentSpan { agent: 0, seq_range: (0..0).into() },
        }
    }
}

impl CGEntry {
    /// True when this entry simply extends the previous version linearly.
    pub fn parents_are_trivial(&self) -> bool {
        self.start > 0 && self.parents.len() == 1 && self.parents[0] == self.start - 1
    }

    pub fn time_span(&self) -> LVRange {
        (self.start..self.start + self.len()).into()
    }
}

impl HasLength for CGEntry {
    fn len(&self) -> usize {
        self.span.seq_range.len()
    }
}

impl MergableSpan for CGEntry {
    fn can_append(&self, other: &Self) -> bool {
        let end = self.start + self.len();
        (end == other.start) && other.parents_are_trivial() && self.span.can_append(&other.span)
    }

    fn append(&mut self, other: Self) {
        self.span.append(other.span)
        // Other's parents are trivial; they don't matter.
    }
}

impl SplitableSpan for CGEntry {
    fn truncate(&mut self, at: usize) -> Self {
        debug_assert!(at >= 1);
        CGEntry {
            start: self.start + at,
            parents: Frontier::new_1(self.start + at - 1),
            span: self.span.truncate(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rle::test_splitable_methods_valid;

    #[test]
    fn cg_entry_splits() {
        test_splitable_methods_valid(CGEntry {
            start: 10,
            parents: Frontier::new_1(4),
            span: AgentSpan { agent: 0, seq_range: (20..25).into() },
        });
    }

    #[test]
    fn merge_needs_trivial_parents() {
        let a = CGEntry {
            start: 0,
            parents: Frontier::root(),
            span: AgentSpan { agent: 0, seq_range: (0..2).into() },
        };
        let linear = CGEntry {
            start: 2,
            parents: Frontier::new_1(1),
            span: AgentSpan { agent: 0, seq_range: (2..4).into() },
        };
        let merge = CGEntry {
            start: 2,
            parents: Frontier::from_sorted(&[0, 1]),
            span: AgentSpan { agent: 0, seq_range: (2..4).into() },
        };
        assert!(a.can_append(&linear));
        assert!(!a.can_append(&merge));
    }
}

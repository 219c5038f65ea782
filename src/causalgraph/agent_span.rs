use std::ops::Range;

use crate::rle::{HasLength, MergableSpan, Searchable, SplitableSpan};
use crate::{AgentId, LVRange};

/// An `(agent id, seq)` pair naming a single change. The agent id is this
/// peer's dense handle for the agent's name.
pub type AgentVersion = (AgentId, usize);

/// A run of consecutive sequence numbers from a single agent.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AgentSpan {
    pub agent: AgentId,
    pub seq_range: LVRange,
}

impl From<(AgentId, LVRange)> for AgentSpan {
    fn from((agent, seq_range): (AgentId, LVRange)) -> Self {
        AgentSpan { agent, seq_range }
    }
}

impl From<(AgentId, Range<usize>)> for AgentSpan {
    fn from((agent, seq_range): (AgentId, Range<usize>)) -> Self {
        AgentSpan { agent, seq_range: seq_range.into() }
    }
}

impl From<AgentVersion> for AgentSpan {
    fn from((agent, seq): AgentVersion) -> Self {
        AgentSpan { agent, seq_range: seq.into() }
    }
}

impl Searchable for AgentSpan {
    type Item = AgentVersion;

    fn get_offset(&self, (agent, seq): AgentVersion) -> Option<usize> {
        if self.agent == agent {
            self.seq_range.get_offset(seq)
        } else {
            None
        }
    }

    fn at_offset(&self, offset: usize) -> AgentVersion {
        debug_assert!(offset < self.len());
        (self.agent, self.seq_range.start + offset)
    }
}

impl HasLength for AgentSpan {
    fn len(&self) -> usize {
        self.seq_range.len()
    }
}

impl SplitableSpan for AgentSpan {
    fn truncate(&mut self, at: usize) -> Self {
        AgentSpan {
            agent: self.agent,
            seq_range: self.seq_range.truncate(at),
        }
    }

    fn truncate_keeping_right(&mut self, at: usize) -> Self {
        AgentSpan {
            agent: self.agent,
            seq_range: self.seq_range.truncate_keeping_right(at),
        }
    }
}

impl MergableSpan for AgentSpan {
    fn can_append(&self, other: &Self) -> bool {
        self.agent == other.agent && self.seq_range.end == other.seq_range.start
    }

    fn append(&mut self, other: Self) {
        self.seq_range.end = other.seq_range.end;
    }

    fn prepend(&mut self, other: Self) {
        self.seq_range.start = other.seq_range.start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rle::test_splitable_methods_valid;

    #[test]
    fn agent_span_is_splitable() {
        test_splitable_methods_valid(AgentSpan { agent: 2, seq_range: (10..20).into() });
    }

    #[test]
    fn merge_requires_same_agent() {
        let a = AgentSpan { agent: 0, seq_range: (0..5).into() };
        let b = AgentSpan { agent: 1, seq_range: (5..6).into() };
        assert!(!a.can_append(&b));
    }
}

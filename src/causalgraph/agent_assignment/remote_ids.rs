//! Conversions between local versions and the `(agent, seq)` identities
//! which are safe to pass to remote peers.

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

use crate::causalgraph::agent_assignment::AgentAssignment;
use crate::error::CgError;
use crate::rle::{HasLength, MergableSpan, SplitableSpan};
use crate::{Frontier, LVRange, LV};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The public name of a single change: `(agent, seq)`. Remote versions are
/// the only version identifiers which may be shipped to another peer.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteVersion {
    pub agent: SmartString,
    pub seq: usize,
}

impl RemoteVersion {
    pub fn new(agent: &str, seq: usize) -> Self {
        Self { agent: agent.into(), seq }
    }
}

impl<S: Into<SmartString>> From<(S, usize)> for RemoteVersion {
    fn from((agent, seq): (S, usize)) -> Self {
        Self { agent: agent.into(), seq }
    }
}

/// A run of consecutive seqs from one agent, by public name.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteVersionSpan {
    pub agent: SmartString,
    pub seq_range: LVRange,
}

impl HasLength for RemoteVersionSpan {
    fn len(&self) -> usize {
        self.seq_range.len()
    }
}

impl SplitableSpan for RemoteVersionSpan {
    fn truncate(&mut self, at: usize) -> Self {
        Self {
            agent: self.agent.clone(),
            seq_range: self.seq_range.truncate(at),
        }
    }
}

impl MergableSpan for RemoteVersionSpan {
    fn can_append(&self, other: &Self) -> bool {
        self.agent == other.agent && self.seq_range.can_append(&other.seq_range)
    }

    fn append(&mut self, other: Self) {
        self.seq_range.append(other.seq_range)
    }
}

impl AgentAssignment {
    /// Is this exact `(agent, seq)` pair known here?
    pub fn has_remote_version(&self, agent: &str, seq: usize) -> bool {
        self.try_remote_to_local_version(agent, seq).is_some()
    }

    pub fn try_remote_to_local_version(&self, agent: &str, seq: usize) -> Option<LV> {
        let agent = self.get_agent_id(agent)?;
        self.client_data[agent as usize].try_seq_to_lv(seq)
    }

    pub fn remote_to_local_version(&self, agent: &str, seq: usize) -> Result<LV, CgError> {
        self.try_remote_to_local_version(agent, seq)
            .ok_or(CgError::NotFound)
    }

    /// Map a remote span to the longest contiguous run of local versions
    /// starting at its first seq. The result may be shorter than the input.
    pub fn remote_to_local_version_span(
        &self,
        agent: &str,
        seq_range: LVRange,
    ) -> Result<LVRange, CgError> {
        let agent = self.get_agent_id(agent).ok_or(CgError::NotFound)?;
        self.client_data[agent as usize]
            .try_seq_to_lv_span(seq_range)
            .ok_or(CgError::NotFound)
    }

    pub fn local_to_remote_version(&self, v: LV) -> RemoteVersion {
        let (agent, seq) = self.lv_to_agent_version(v);
        RemoteVersion {
            agent: self.get_agent_name(agent).into(),
            seq,
        }
    }

    /// **NOTE:** the returned span covers `min(requested len, run len)`
    /// items; it is not guaranteed to be as long as the input.
    pub fn local_to_remote_version_span(&self, v_range: LVRange) -> RemoteVersionSpan {
        let span = self.lv_span_to_agent_span(v_range);
        RemoteVersionSpan {
            agent: self.get_agent_name(span.agent).into(),
            seq_range: span.seq_range,
        }
    }

    /// Map a set of remote versions to a local frontier. The result is
    /// sorted by LV; it is *not* reduced to its dominator set.
    pub fn remote_to_local_frontier<'a, I>(&self, ids_iter: I) -> Result<Frontier, CgError>
    where
        I: Iterator<Item = &'a RemoteVersion>,
    {
        let lvs = ids_iter
            .map(|rv| self.remote_to_local_version(&rv.agent, rv.seq))
            .collect::<Result<SmallVec<[LV; 2]>, CgError>>()?;
        Ok(Frontier::from_unsorted(&lvs))
    }
}

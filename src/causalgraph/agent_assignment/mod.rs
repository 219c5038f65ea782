//! The identity half of the causal graph: bidirectional mapping between
//! local versions and public `(agent, seq)` pairs.

use std::cmp::Ordering;

use smartstring::alias::String as SmartString;

use crate::causalgraph::agent_span::{AgentSpan, AgentVersion};
use crate::rle::{HasLength, KVPair, RleVec};
use crate::{AgentId, LVRange, LV};

pub mod remote_ids;

#[derive(Clone, Debug, Default)]
pub(crate) struct ClientData {
    /// The agent's public name.
    pub(crate) name: SmartString,

    /// An in-order list of every operation from this agent, keyed by seq,
    /// mapping to the span of local versions assigned to it.
    ///
    /// This list is sparse: seq holes are allowed (and stay holes forever).
    /// The LV spans will *almost* always be monotonically increasing, but a
    /// single agent id used on multiple concurrent branches can make them
    /// arrive out of seq order locally. The order of LV spans always obeys
    /// the partial order of changes.
    pub(crate) item_times: RleVec<KVPair<LVRange>>,
}

impl ClientData {
    /// The next sequence number this agent would assign. Holes below are
    /// skipped, never refilled.
    pub fn get_next_seq(&self) -> usize {
        self.item_times.end()
    }

    pub fn is_empty(&self) -> bool {
        self.item_times.is_empty()
    }

    #[inline]
    pub(crate) fn try_seq_to_lv(&self, seq: usize) -> Option<LV> {
        let (entry, offset) = self.item_times.find_with_offset(seq)?;
        Some(entry.1.start + offset)
    }

    /// The longest contiguous run of local versions starting at `seq_range`.
    /// The returned span may be shorter than the request.
    pub(crate) fn try_seq_to_lv_span(&self, seq_range: LVRange) -> Option<LVRange> {
        let (KVPair(_, entry), offset) = self.item_times.find_with_offset(seq_range.start)?;

        let start = entry.start + offset;
        let end = usize::min(entry.end, start + seq_range.len());
        Some(LVRange { start, end })
    }
}

/// Maps local versions to public `(agent, seq)` identities and back.
///
/// `client_with_lv` is packed and keyed by LV; `client_data` holds the
/// per-agent inverse, keyed by seq. The two always agree.
#[derive(Debug, Clone, Default)]
pub struct AgentAssignment {
    pub(crate) client_with_lv: RleVec<KVPair<AgentSpan>>,
    pub(crate) client_data: Vec<ClientData>,
}

impl AgentAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.client_data
            .iter()
            .position(|client_data| client_data.name == name)
            .map(|id| id as AgentId)
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        if name == "ROOT" {
            panic!("Agent ID 'ROOT' is reserved");
        }

        if let Some(id) = self.get_agent_id(name) {
            id
        } else {
            self.client_data.push(ClientData {
                name: SmartString::from(name),
                item_times: RleVec::new(),
            });
            (self.client_data.len() - 1) as AgentId
        }
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.client_data[agent as usize].name.as_str()
    }

    /// The number of changes assigned. Equals the causal graph's `len()`.
    pub fn len(&self) -> usize {
        self.client_with_lv.end()
    }

    pub fn is_empty(&self) -> bool {
        self.client_with_lv.is_empty()
    }

    /// The next seq the named agent would assign, or 0 for unknown agents.
    pub fn next_seq_for_agent(&self, name: &str) -> usize {
        self.get_agent_id(name)
            .map(|agent| self.client_data[agent as usize].get_next_seq())
            .unwrap_or(0)
    }

    pub fn lv_to_agent_version(&self, v: LV) -> AgentVersion {
        self.client_with_lv.get(v)
    }

    /// The identity span at `v`, clipped to `v_range`. The result may be
    /// shorter than the request when the underlying run ends early.
    pub fn lv_span_to_agent_span(&self, v_range: LVRange) -> AgentSpan {
        let (pair, offset) = self.client_with_lv.find_packed_with_offset(v_range.start);
        let start = pair.1.seq_range.start + offset;
        let end = usize::min(pair.1.seq_range.end, start + v_range.len());
        AgentSpan {
            agent: pair.1.agent,
            seq_range: LVRange { start, end },
        }
    }

    pub fn try_agent_version_to_lv(&self, (agent, seq): AgentVersion) -> Option<LV> {
        self.client_data
            .get(agent as usize)
            .and_then(|c| c.try_seq_to_lv(seq))
    }

    /// Assign the next run of local versions to the named agent, at the
    /// agent's next sequence number. `span` must start at `self.len()`.
    pub(crate) fn assign_next_lv_to_client_known(&mut self, agent: AgentId, span: LVRange) {
        debug_assert_eq!(span.start, self.len());

        let client_data = &mut self.client_data[agent as usize];

        let next_seq = client_data.get_next_seq();
        client_data.item_times.push(KVPair(next_seq, span));

        self.client_with_lv.push(KVPair(
            span.start,
            AgentSpan {
                agent,
                seq_range: LVRange { start: next_seq, end: next_seq + span.len() },
            },
        ));
    }

    /// The canonical tie-break for concurrent changes: lexicographic on
    /// agent name, then seq.
    pub fn tie_break_agent_versions(&self, v1: AgentVersion, v2: AgentVersion) -> Ordering {
        if v1 == v2 {
            Ordering::Equal
        } else {
            let c1 = &self.client_data[v1.0 as usize];
            let c2 = &self.client_data[v2.0 as usize];

            c1.name.cmp(&c2.name).then(v1.1.cmp(&v2.1))
        }
    }

    pub fn tie_break_versions(&self, v1: LV, v2: LV) -> Ordering {
        if v1 == v2 {
            Ordering::Equal
        } else {
            self.tie_break_agent_versions(
                self.lv_to_agent_version(v1),
                self.lv_to_agent_version(v2),
            )
        }
    }
}

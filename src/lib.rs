//! An in-memory causal graph for operation-based CRDTs.
//!
//! A causal graph stores, for every known change, a globally unique public
//! identity (an `(agent, seq)` pair) and the set of prior changes the change
//! causally depends on (its *parents*). It answers the questions distributed
//! data structures ask constantly: have I seen this change? How do two
//! histories differ? Does one version dominate another? What is the minimal
//! frontier summarising this set?
//!
//! Internally everything is run-length encoded. Changes are numbered with
//! dense *local versions* (LVs) in insertion order, and two RLE indexes map
//! between LVs and public `(agent, seq)` pairs in both directions. The graph
//! algorithms ([`Graph::diff`], [`Graph::find_dominators`], and friends) walk
//! the parent structure with a max-heap, consuming whole runs at a time.
//!
//! Local versions are private to a peer and must never be shipped to another
//! peer directly. Use the serialization module ([`causalgraph::serialize`])
//! to exchange changes: deltas name versions by `(agent, seq)` or by
//! delta-relative offset, never by raw LV.
//!
//! ```
//! use causal_graph::CausalGraph;
//!
//! let mut cg = CausalGraph::new();
//! let seph = cg.get_or_create_agent_id("seph");
//! cg.assign_local_op(seph, 3);
//! assert_eq!(cg.len(), 3);
//! assert_eq!(cg.version.as_ref(), &[2]);
//! ```

pub mod rle;
mod lvrange;
mod frontier;
mod error;
pub mod causalgraph;

pub use lvrange::LVRange;
pub use frontier::Frontier;
pub use error::CgError;
pub use causalgraph::CausalGraph;
pub use causalgraph::entry::CGEntry;
pub use causalgraph::agent_span::{AgentSpan, AgentVersion};
pub use causalgraph::agent_assignment::remote_ids::{RemoteVersion, RemoteVersionSpan};
pub use causalgraph::summary::VersionSummary;
pub use causalgraph::graph::Graph;
pub use causalgraph::graph::tools::{DiffFlag, DiffResult};

/// A local version. The nth change recorded by this peer gets LV n.
///
/// LVs are dense and monotonic, which makes them useful as indexes into
/// other run-length encoded data structures. They are not stable across
/// peers - the same change will usually have different LVs on different
/// peers.
pub type LV = usize;

/// Densely numbered internal handle for an agent name. Like LVs, agent ids
/// are local to this peer.
pub type AgentId = u32;

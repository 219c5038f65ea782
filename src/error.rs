use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors surfaced by the causal graph.
///
/// Note duplicate delta application is *not* an error anywhere in this crate.
/// Re-merging spans the graph already knows is the defined idempotent
/// behaviour and silently does nothing.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum CgError {
    /// The referenced `(agent, seq)` pair or local version is unknown to this
    /// graph. `try_`-prefixed lookup variants return `None` instead.
    NotFound,

    /// An inserted span overlaps an entry already in a sorted RLE list.
    AlreadyExists,

    /// A caller-supplied argument is outside the method's domain, eg passing
    /// the same version twice to `version_cmp`, or a truncate offset out of
    /// range.
    InvalidArgument,

    /// A delta entry references a parent which is neither inside the delta
    /// nor in its external reference table. The payload is the index of the
    /// offending delta entry.
    InvalidDeltaParent(usize),

    /// Internal consistency failure. This indicates a bug in the library (or
    /// memory corruption); it should never fire.
    InvariantViolation,
}

impl Display for CgError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CgError {:?}", self)
    }
}

impl Error for CgError {}

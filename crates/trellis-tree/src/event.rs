//! Change events delivered to listeners
//!
//! Every successful write allocates the next global sequence number and
//! produces exactly one event. The same event value is what every
//! interested listener along the path receives; `old`/`new` always refer
//! to the written slot, not to the listener's own path.

use trellis_core::{Path, Value};

/// A single change notification
#[derive(Debug, Clone)]
pub enum Event {
    /// The value at `path` was replaced
    DataChanged {
        /// Path of the written slot
        path: Path,
        /// Previous occupant, if the slot existed
        old: Option<Value>,
        /// The written value
        new: Value,
        /// Global sequence number of this change
        seq: u64,
    },
    /// The per-path metadata at `path` differs after a bulk replacement
    MetaChanged {
        /// Path whose metadata changed
        path: Path,
        /// Previous metadata, if any
        old: Option<Value>,
        /// New metadata, if any
        new: Option<Value>,
        /// Global sequence number of this change
        seq: u64,
    },
    /// The tree-wide metadata value was replaced (broadcast)
    TreeMetaChanged {
        /// Previous tree-wide metadata
        old: Value,
        /// New tree-wide metadata
        new: Value,
        /// Global sequence number of this change
        seq: u64,
    },
}

impl Event {
    /// The global sequence number of this event
    pub fn seq(&self) -> u64 {
        match self {
            Event::DataChanged { seq, .. }
            | Event::MetaChanged { seq, .. }
            | Event::TreeMetaChanged { seq, .. } => *seq,
        }
    }

    /// The changed path; `None` for tree-wide events
    pub fn path(&self) -> Option<&Path> {
        match self {
            Event::DataChanged { path, .. } | Event::MetaChanged { path, .. } => Some(path),
            Event::TreeMetaChanged { .. } => None,
        }
    }

    /// Whether this is a tree-wide broadcast event
    pub fn is_tree_wide(&self) -> bool {
        matches!(self, Event::TreeMetaChanged { .. })
    }
}

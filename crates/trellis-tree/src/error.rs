//! Error types for trellis-tree
//!
//! None of these are retried or swallowed internally: every variant is an
//! invariant violation or caller bug that must surface immediately, since
//! degrading silently would mean missed or duplicated notifications.

use thiserror::Error;

/// Result type for trellis-tree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in trellis-tree
#[derive(Debug, Error)]
pub enum Error {
    /// A write whose value is identical (by reference for containers, by
    /// value for primitives) to the current occupant. Indistinguishable
    /// from a no-op, so it is treated as a caller bug.
    #[error("value at path {path:?} is identical to the written value")]
    UnchangedValue {
        /// Path of the rejected write
        path: String,
    },

    /// Listener bookkeeping misuse: removing a listener that is not
    /// registered, or re-entering the flush driver while it is running.
    #[error("listener state: {0}")]
    ListenerState(String),

    /// Core error (malformed path, circular reference during a diff)
    #[error("core error: {0}")]
    Core(#[from] trellis_core::Error),
}

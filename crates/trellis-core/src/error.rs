//! Error types for trellis-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A non-empty path string that does not split into at least two
    /// separator-delimited parts. Always a caller bug.
    #[error("malformed path: {0:?}")]
    MalformedPath(String),

    /// The difference engine revisited a shared container while the
    /// circular-reference policy was `Error`.
    #[error("circular reference at {0:?}")]
    CircularReference(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

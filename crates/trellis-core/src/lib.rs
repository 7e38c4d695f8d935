//! Trellis Core - value model and path algorithms for the reactive tree
//!
//! This crate provides the pieces of trellis that carry no subscription
//! state:
//! - Dynamic value types (`Value`, `ValueMap`) with `Rc`-shared containers
//! - Dot-path parsing and classification (`Path`, `classify`)
//! - The path resolver (`resolve::get`, `resolve::set`) with structural
//!   sharing: a write rebuilds only the spine from the root to the written
//!   slot, so every sibling subtree keeps its identity
//! - The difference engine (`diff`) with a circular-reference policy
//!
//! The reactive container itself (subscription overlay, event router,
//! flush engine) lives in `trellis-tree`.

pub mod diff;
mod error;
mod path;
pub mod resolve;
mod value;

pub use diff::{diff, CircularPolicy, DiffKind, DiffOptions, DiffRecord};
pub use error::{Error, Result};
pub use path::{classify, Path, PathRelation, Segment, SEPARATOR};
pub use value::{Value, ValueMap};

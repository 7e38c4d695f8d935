//! trellis-tree: a path-addressed reactive data container
//!
//! A [`Tree`] holds one dynamic value addressed by dot-paths. Handles
//! write through [`NodeHandle::set_data`], and listeners registered at
//! any path receive change events in strict root-to-target order, one
//! interested node at a time. Subscription bookkeeping lives in a
//! sparse overlay that only materializes the paths someone listens to.
//!
//! ```
//! use trellis_tree::{Tree, Value};
//!
//! let tree = Tree::new(Value::Null);
//! let token = tree.root().add_listener(true, |events| {
//!     for ev in events {
//!         println!("{ev:?}");
//!     }
//! });
//! tree.node(".name").unwrap().set_data(Value::from("Pikachu Plush")).unwrap();
//! tree.root().remove_listener(token).unwrap();
//! ```

mod error;
mod event;
mod flush;
mod handle;
mod node;
mod overlay;
mod router;
mod state;

pub use error::{Error, Result};
pub use event::Event;
pub use handle::{NodeHandle, Tree};
pub use node::ListenerToken;

pub use trellis_core::{
    diff, CircularPolicy, DiffKind, DiffOptions, DiffRecord, Path, PathRelation, Value, ValueMap,
};

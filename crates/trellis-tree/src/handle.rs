//! Public handles over a shared tree
//!
//! `Tree` owns the state; `NodeHandle` is a cheap path-scoped view that
//! can be cloned freely and captured by listener callbacks. All
//! mutation goes through a handle: stage the write, then drive the
//! flush unless one is already draining.

use crate::error::Result;
use crate::event::Event;
use crate::flush;
use crate::node::ListenerToken;
use crate::state::TreeState;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use trellis_core::{resolve, Path, Value};

/// A path-addressed reactive data container
pub struct Tree {
    shared: Rc<RefCell<TreeState>>,
}

impl Tree {
    /// Create a tree holding `initial` as its root value
    pub fn new(initial: Value) -> Self {
        Self {
            shared: Rc::new(RefCell::new(TreeState::new(initial))),
        }
    }

    /// Handle on the root path
    pub fn root(&self) -> NodeHandle {
        NodeHandle {
            shared: self.shared.clone(),
            path: Path::root(),
        }
    }

    /// Handle on an arbitrary path
    pub fn node(&self, path: &str) -> Result<NodeHandle> {
        Ok(NodeHandle {
            shared: self.shared.clone(),
            path: Path::parse(path)?,
        })
    }
}

/// A view of one path in a tree
///
/// Handles do not keep the node materialized; only listener
/// registrations do that. Cloning a handle clones the path and bumps
/// the shared-state reference count, nothing else.
#[derive(Clone)]
pub struct NodeHandle {
    shared: Rc<RefCell<TreeState>>,
    path: Path,
}

impl NodeHandle {
    /// The path this handle addresses
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle on a path below this one
    pub fn node(&self, sub: &str) -> Result<NodeHandle> {
        Ok(NodeHandle {
            shared: self.shared.clone(),
            path: self.path.join(&Path::parse(sub)?),
        })
    }

    /// The current value at this path, if the path resolves
    pub fn data(&self) -> Option<Value> {
        let state = self.shared.borrow();
        resolve::get(&state.data, &self.path).cloned()
    }

    /// Write `value` at this path and deliver the resulting events
    ///
    /// Rejects a value identical to the current occupant. When called
    /// from inside a listener callback the write is staged only; the
    /// flush already draining picks it up and delivers it in order.
    pub fn set_data(&self, value: Value) -> Result<()> {
        let flushing = {
            let mut state = self.shared.borrow_mut();
            state.stage_set_data(&self.path, value)?;
            state.flushing
        };
        if !flushing {
            flush::run_flush(&self.shared)?;
        }
        Ok(())
    }

    /// The tree-wide metadata value
    pub fn meta(&self) -> Value {
        self.shared.borrow().tree_meta.clone()
    }

    /// Replace the tree-wide metadata, broadcasting to root listeners
    pub fn set_meta(&self, value: Value) -> Result<()> {
        let flushing = {
            let mut state = self.shared.borrow_mut();
            state.stage_set_meta(value)?;
            state.flushing
        };
        if !flushing {
            flush::run_flush(&self.shared)?;
        }
        Ok(())
    }

    /// The per-path metadata stored at this handle's path, if any
    pub fn node_meta(&self) -> Option<Value> {
        self.shared
            .borrow()
            .node_meta
            .get(self.path.as_str())
            .cloned()
    }

    /// Replace the whole per-path metadata map, delivering one event
    /// per path whose value actually differs
    pub fn set_meta_bulk(&self, next: IndexMap<String, Value>) -> Result<()> {
        let flushing = {
            let mut state = self.shared.borrow_mut();
            state.stage_set_meta_bulk(next)?;
            state.flushing
        };
        if !flushing {
            flush::run_flush(&self.shared)?;
        }
        Ok(())
    }

    /// Subscribe to events at this path
    ///
    /// With `wants_descendants` the listener also receives events for
    /// paths strictly below this one. Registration never replays
    /// history, including events still in flight.
    pub fn add_listener(
        &self,
        wants_descendants: bool,
        callback: impl FnMut(&[Event]) + 'static,
    ) -> ListenerToken {
        self.shared.borrow_mut().add_listener(
            &self.path,
            wants_descendants,
            Rc::new(RefCell::new(callback)),
        )
    }

    /// Drop a listener registration
    pub fn remove_listener(&self, token: ListenerToken) -> Result<()> {
        self.shared.borrow_mut().remove_listener(&self.path, token)
    }
}

//! Overlay nodes and the arena that owns them
//!
//! Nodes are addressed by stable `NodeId` indices into an arena rather
//! than by references, so relinking during materialize/unlink is index
//! reassignment and an in-flight relay can never hold a dangling pointer.

use crate::event::Event;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use trellis_core::Path;

/// Stable index of a materialized overlay node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Handle identifying one listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub(crate) u64);

impl fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener:{}", self.0)
    }
}

/// Listener callback, shared so it can be invoked with the tree state
/// borrow released
pub(crate) type Callback = Rc<RefCell<dyn FnMut(&[Event])>>;

/// One listener registration at a node
pub(crate) struct Listener {
    pub token: ListenerToken,
    /// Also interested in changes strictly below the node's path
    pub wants_descendants: bool,
    /// Highest sequence number already delivered to this listener
    pub watermark: u64,
    pub callback: Callback,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("token", &self.token)
            .field("wants_descendants", &self.wants_descendants)
            .field("watermark", &self.watermark)
            .finish_non_exhaustive()
    }
}

/// A materialized node of the subscription overlay
///
/// Exists only while it has a listener, routes pending work, or is the
/// root. Holds the three pending-event buckets the flush engine drains.
#[derive(Debug)]
pub(crate) struct OverlayNode {
    /// Canonical path of this node, segments cached
    pub path: Path,
    /// Nearest materialized proper ancestor; `None` only at the root
    pub parent: Option<NodeId>,
    /// Materialized nodes whose nearest materialized ancestor is this one
    pub children: Vec<NodeId>,
    /// Children currently holding pending work somewhere in their
    /// subtree, in insertion order (the deterministic discovery order)
    pub pending_children: Vec<NodeId>,
    /// Listener registrations at this exact path
    pub listeners: Vec<Listener>,
    /// Events whose path equals this node's path
    pub exact: Vec<Event>,
    /// Events on a strict descendant path currently routed here
    pub descendant: Vec<Event>,
    /// Tree-wide broadcast events (only ever non-empty at the root)
    pub tree_wide: Vec<Event>,
    /// Highest sequence already seen by every current listener; advisory
    /// short-circuit for fully quiesced nodes
    pub watermark: u64,
    /// OR of the listeners' descendant flags, cached for the router
    pub interested_in_descendants: bool,
}

impl OverlayNode {
    pub fn new(path: Path, parent: Option<NodeId>, watermark: u64) -> Self {
        Self {
            path,
            parent,
            children: Vec::new(),
            pending_children: Vec::new(),
            listeners: Vec::new(),
            exact: Vec::new(),
            descendant: Vec::new(),
            tree_wide: Vec::new(),
            watermark,
            interested_in_descendants: false,
        }
    }

    /// Whether any event bucket is non-empty
    pub fn has_buckets(&self) -> bool {
        !self.exact.is_empty() || !self.descendant.is_empty() || !self.tree_wide.is_empty()
    }

    /// Whether this node holds or routes any pending work
    pub fn has_pending(&self) -> bool {
        self.has_buckets() || !self.pending_children.is_empty()
    }

    /// Recompute the cached descendant-interest flag
    pub fn recompute_interest(&mut self) {
        self.interested_in_descendants = self.listeners.iter().any(|l| l.wants_descendants);
    }

    /// The shared watermark when every listener agrees, `None` otherwise
    pub fn uniform_listener_watermark(&self) -> Option<u64> {
        let first = self.listeners.first()?.watermark;
        self.listeners
            .iter()
            .all(|l| l.watermark == first)
            .then_some(first)
    }
}

/// Arena of overlay nodes with slot reuse
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    nodes: Vec<Option<OverlayNode>>,
    free: Vec<u32>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: OverlayNode) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId((self.nodes.len() - 1) as u32)
            }
        }
    }

    pub fn remove(&mut self, id: NodeId) -> OverlayNode {
        let node = self.nodes[id.index()]
            .take()
            .expect("removed overlay node is materialized");
        self.free.push(id.0);
        node
    }

    pub fn get(&self, id: NodeId) -> &OverlayNode {
        self.nodes[id.index()]
            .as_ref()
            .expect("overlay node id is live")
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut OverlayNode {
        self.nodes[id.index()]
            .as_mut()
            .expect("overlay node id is live")
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}

//! The subscription overlay: a sparse tree of materialized nodes
//!
//! A node exists iff it has a listener, routes pending work between the
//! root and one, or is the root. Structure changes are link/unlink/
//! reparent operations over arena indices; the `by_path` map keys every
//! live node by its canonical path string.

use crate::node::{NodeArena, NodeId, OverlayNode};
use std::collections::HashMap;
use tracing::debug;
use trellis_core::{classify, Path, PathRelation};

pub(crate) struct Overlay {
    arena: NodeArena,
    by_path: HashMap<String, NodeId>,
    root: NodeId,
}

impl Overlay {
    pub fn new() -> Self {
        let mut arena = NodeArena::new();
        let root = arena.insert(OverlayNode::new(Path::root(), None, 0));
        let mut by_path = HashMap::new();
        by_path.insert(String::new(), root);
        Self {
            arena,
            by_path,
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &OverlayNode {
        self.arena.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut OverlayNode {
        self.arena.get_mut(id)
    }

    /// Number of materialized nodes, root included
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// The materialized node at exactly `path`, if any
    pub fn node_at(&self, path: &str) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    /// The nearest materialized proper ancestor of `path` (the root when
    /// nothing closer exists)
    pub fn nearest_ancestor(&self, path: &Path) -> NodeId {
        let mut cursor = path.parent();
        while let Some(prefix) = cursor {
            if let Some(id) = self.node_at(prefix.as_str()) {
                return id;
            }
            cursor = prefix.parent();
        }
        self.root
    }

    /// Where routing for `path` starts: the exact node if materialized,
    /// else the nearest materialized ancestor
    pub fn start_for(&self, path: &Path) -> NodeId {
        self.node_at(path.as_str())
            .unwrap_or_else(|| self.nearest_ancestor(path))
    }

    /// Create the node for `path` if absent and splice it into the
    /// overlay
    ///
    /// The new node attaches under its nearest materialized proper
    /// ancestor; any of that ancestor's children lying below the new
    /// path are re-homed under it, moving pending-work marks through the
    /// new hop so the root-to-work chain stays unbroken.
    pub fn materialize(&mut self, path: &Path, baseline: u64) -> NodeId {
        if let Some(id) = self.node_at(path.as_str()) {
            return id;
        }
        let parent = self.nearest_ancestor(path);
        let id = self
            .arena
            .insert(OverlayNode::new(path.clone(), Some(parent), baseline));
        self.by_path.insert(path.as_str().to_string(), id);

        let siblings = self.node(parent).children.clone();
        for child in siblings {
            if classify(&self.node(child).path, path) != PathRelation::Child {
                continue;
            }
            self.node_mut(parent).children.retain(|&c| c != child);
            self.node_mut(child).parent = Some(id);
            self.node_mut(id).children.push(child);

            let was_pending = {
                let p = self.node_mut(parent);
                let found = p.pending_children.contains(&child);
                p.pending_children.retain(|&c| c != child);
                found
            };
            if was_pending {
                self.node_mut(id).pending_children.push(child);
                let p = self.node_mut(parent);
                if !p.pending_children.contains(&id) {
                    p.pending_children.push(id);
                }
            }
        }
        self.node_mut(parent).children.push(id);
        debug!(path = %path, %id, "materialized overlay node");
        id
    }

    /// Detach one listener-less, work-less, non-root node, re-parenting
    /// its children to its own parent. Returns the parent.
    pub fn unlink(&mut self, id: NodeId) -> NodeId {
        let node = self.arena.remove(id);
        debug_assert!(node.listeners.is_empty() && !node.has_pending());
        let parent = node.parent.expect("the root is never unlinked");
        self.by_path.remove(node.path.as_str());
        {
            let p = self.node_mut(parent);
            p.children.retain(|&c| c != id);
            p.pending_children.retain(|&c| c != id);
        }
        for child in node.children {
            self.node_mut(child).parent = Some(parent);
            self.node_mut(parent).children.push(child);
            if self.node(child).has_pending() {
                let p = self.node_mut(parent);
                if !p.pending_children.contains(&child) {
                    p.pending_children.push(child);
                }
            }
        }
        debug!(path = %node.path, %id, "unlinked overlay node");
        parent
    }

    /// Unlink `id` and then its ancestors for as long as they are
    /// listener-less, work-less and not the root
    pub fn release(&mut self, mut id: NodeId) {
        loop {
            if id == self.root {
                return;
            }
            let node = self.node(id);
            if !node.listeners.is_empty() || node.has_pending() {
                return;
            }
            id = self.unlink(id);
        }
    }
}

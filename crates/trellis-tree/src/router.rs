//! Event router: file each event at exactly one overlay node
//!
//! An event lives in one node's buckets at a time. Delivery to every
//! interested ancestor happens through repeated single-hop relays driven
//! by the flush engine, not by fanning the event out once.

use crate::event::Event;
use crate::node::NodeId;
use crate::state::TreeState;
use tracing::trace;
use trellis_core::{classify, PathRelation};

impl TreeState {
    /// File `event` at its insertion node
    ///
    /// Unbounded filings (`ceiling = None`) walk from the event's start
    /// node all the way to the root; relays pass the node that just
    /// consumed the event as the exclusive ceiling, which finds the next
    /// interested node strictly between it and the event's true path, or
    /// drops the event when nothing is materialized below.
    pub(crate) fn file(&mut self, event: Event, ceiling: Option<NodeId>) {
        let root = self.overlay.root();
        let Some(path) = event.path() else {
            // Tree-wide events broadcast from the root, unconditionally
            self.overlay.node_mut(root).tree_wide.push(event);
            return;
        };

        let start = self.overlay.start_for(path);
        if let Some(ceiling_id) = ceiling {
            let below = start != ceiling_id
                && classify(
                    &self.overlay.node(start).path,
                    &self.overlay.node(ceiling_id).path,
                ) == PathRelation::Child;
            if !below {
                // Nothing materialized strictly below the ceiling on
                // this path: the event is fully consumed
                trace!(path = %path, seq = event.seq(), "relay consumed");
                return;
            }
        }

        // The highest descendant-interested node between the start and
        // the ceiling wins; otherwise the event stays at the start
        let mut insertion = start;
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            if Some(id) == ceiling {
                break;
            }
            if self.overlay.node(id).interested_in_descendants {
                insertion = id;
            }
            cursor = self.overlay.node(id).parent;
        }

        let node = self.overlay.node_mut(insertion);
        trace!(path = %path, seq = event.seq(), at = %node.path, "event filed");
        match classify(path, &node.path) {
            PathRelation::Exact => node.exact.push(event),
            _ => node.descendant.push(event),
        }
        self.mark_pending(insertion);
    }

    /// Record `id` in its ancestors' pending-children links, stopping at
    /// the first ancestor that already tracks the chain
    fn mark_pending(&mut self, id: NodeId) {
        let mut cursor = id;
        while let Some(parent) = self.overlay.node(cursor).parent {
            let p = self.overlay.node_mut(parent);
            if p.pending_children.contains(&cursor) {
                break;
            }
            p.pending_children.push(cursor);
            cursor = parent;
        }
    }
}

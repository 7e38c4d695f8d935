//! Relay/flush engine: drain filed events in root-to-target order
//!
//! The driver is a trampoline, not a call stack: it repeatedly locates
//! the shallowest node with pending buckets, delivers, and relays
//! descendant-scope events one hop deeper. A reentrant write from inside
//! a listener callback only files its event and returns; the outer
//! driver notices the advanced sequence counter and restarts its search
//! from the root, so new events are still delivered top-down and never
//! interleave out of order with in-flight ones.

use crate::error::{Error, Result};
use crate::event::Event;
use crate::node::{Callback, NodeId};
use crate::state::TreeState;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;
use trellis_core::Path;

/// One batch of listener invocations prepared under the state borrow,
/// executed with the borrow released
pub(crate) struct Delivery {
    node: NodeId,
    calls: Vec<(Callback, Vec<Event>)>,
    seq_snapshot: u64,
}

/// Run the outer driver until no pending work remains
///
/// Must not be called while a flush is already draining: the in-progress
/// driver is solely responsible for completing delivery, and a second
/// entry would break the ordering guarantees.
pub(crate) fn run_flush(shared: &Rc<RefCell<TreeState>>) -> Result<()> {
    {
        let mut state = shared.borrow_mut();
        if state.flushing {
            return Err(Error::ListenerState(
                "flush driver re-entered while already running".into(),
            ));
        }
        state.flushing = true;
    }
    loop {
        let delivery = shared.borrow_mut().prepare_delivery();
        let Some(delivery) = delivery else { break };
        for (callback, batch) in &delivery.calls {
            (callback.borrow_mut())(batch);
        }
        let mut state = shared.borrow_mut();
        if state.seq != delivery.seq_snapshot {
            // A callback wrote: restart the search from the root so the
            // new events keep root-to-target order
            trace!("reentrant write absorbed, restarting from root");
            continue;
        }
        state.relay_and_settle(delivery.node);
    }
    shared.borrow_mut().flushing = false;
    Ok(())
}

impl TreeState {
    /// Locate the next node with bucketed work and stage its deliveries,
    /// advancing listener watermarks before any callback runs so a
    /// reentrant write cannot double-deliver
    pub(crate) fn prepare_delivery(&mut self) -> Option<Delivery> {
        let id = self.find_work()?;
        let node = self.overlay.node(id);

        let mut batch: Vec<Event> = Vec::with_capacity(
            node.exact.len() + node.descendant.len() + node.tree_wide.len(),
        );
        batch.extend(node.exact.iter().cloned());
        batch.extend(node.descendant.iter().cloned());
        batch.extend(node.tree_wide.iter().cloned());
        batch.sort_by_key(Event::seq);
        let max_seq = batch.last().map(Event::seq).unwrap_or(0);
        let node_path = node.path.clone();

        let mut calls = Vec::new();
        if max_seq > self.overlay.node(id).watermark {
            let node = self.overlay.node_mut(id);
            for listener in &mut node.listeners {
                if listener.watermark >= max_seq {
                    continue;
                }
                let events: Vec<Event> = batch
                    .iter()
                    .filter(|ev| {
                        ev.seq() > listener.watermark
                            && (listener.wants_descendants
                                || !descendant_scope(ev, &node_path))
                    })
                    .cloned()
                    .collect();
                listener.watermark = max_seq;
                if !events.is_empty() {
                    calls.push((listener.callback.clone(), events));
                }
            }
        }
        trace!(at = %node_path, max_seq, calls = calls.len(), "delivery prepared");
        Some(Delivery {
            node: id,
            calls,
            seq_snapshot: self.seq,
        })
    }

    /// Shallowest node with non-empty buckets, found by descending
    /// pending-children links from the root
    fn find_work(&mut self) -> Option<NodeId> {
        self.find_work_in(self.overlay.root())
    }

    fn find_work_in(&mut self, id: NodeId) -> Option<NodeId> {
        if self.overlay.node(id).has_buckets() {
            return Some(id);
        }
        loop {
            let child = self.overlay.node(id).pending_children.first().copied()?;
            if let Some(found) = self.find_work_in(child) {
                return Some(found);
            }
            // The subtree quiesced without unmarking itself
            self.overlay
                .node_mut(id)
                .pending_children
                .retain(|&c| c != child);
        }
    }

    /// Consume a delivered node's buckets: exact and tree-wide are done,
    /// descendant events relay one hop deeper with this node as ceiling.
    /// Then settle the quiescence bookkeeping upward.
    pub(crate) fn relay_and_settle(&mut self, id: NodeId) {
        {
            let node = self.overlay.node_mut(id);
            node.exact.clear();
            node.tree_wide.clear();
        }
        let relays = std::mem::take(&mut self.overlay.node_mut(id).descendant);
        for event in relays {
            self.file(event, Some(id));
        }
        self.settle(id);
    }

    /// Walk upward from a possibly-quiesced node: roll watermarks up,
    /// clear pending-children marks, and unlink nodes whose last
    /// listener left while work was still in flight
    fn settle(&mut self, mut id: NodeId) {
        loop {
            let node = self.overlay.node(id);
            if node.has_pending() {
                return;
            }
            if let Some(w) = node.uniform_listener_watermark() {
                let node = self.overlay.node_mut(id);
                if node.watermark < w {
                    node.watermark = w;
                }
            }
            let watermark = self.overlay.node(id).watermark;
            let Some(parent) = self.overlay.node(id).parent else {
                return;
            };
            {
                let p = self.overlay.node_mut(parent);
                p.pending_children.retain(|&c| c != id);
                // A routing-only parent inherits the quiesced watermark,
                // short-circuiting later delivery checks
                if p.listeners.is_empty() && p.watermark < watermark {
                    p.watermark = watermark;
                }
            }
            if self.overlay.node(id).listeners.is_empty() {
                self.overlay.unlink(id);
            }
            id = parent;
        }
    }
}

fn descendant_scope(event: &Event, node_path: &Path) -> bool {
    event
        .path()
        .map(|p| p.as_str() != node_path.as_str())
        .unwrap_or(false)
}

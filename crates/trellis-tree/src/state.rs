//! Tree state: the live value plus all reactive bookkeeping
//!
//! Everything the container needs (data, metadata, the global sequence
//! counter, the flush guard and the overlay) lives in one `TreeState`
//! value owned by the tree instance. No process-wide statics.

use crate::error::{Error, Result};
use crate::event::Event;
use crate::node::{Callback, Listener, ListenerToken};
use crate::overlay::Overlay;
use indexmap::IndexMap;
use tracing::{debug, trace};
use trellis_core::{diff, resolve, DiffOptions, Path, Value};

pub(crate) struct TreeState {
    /// The live value
    pub data: Value,
    /// Tree-wide metadata
    pub tree_meta: Value,
    /// Per-path metadata, replaced wholesale by bulk updates
    pub node_meta: IndexMap<String, Value>,
    /// Monotonically increasing global sequence counter
    pub seq: u64,
    /// Set while the outer flush driver runs
    pub flushing: bool,
    pub overlay: Overlay,
    next_token: u64,
}

impl TreeState {
    pub fn new(initial: Value) -> Self {
        Self {
            data: initial,
            tree_meta: Value::Null,
            node_meta: IndexMap::new(),
            seq: 0,
            flushing: false,
            overlay: Overlay::new(),
            next_token: 0,
        }
    }

    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Register a listener, materializing its node if needed
    ///
    /// The node and listener watermarks baseline at the current global
    /// sequence, so a late subscriber never replays history.
    pub fn add_listener(
        &mut self,
        path: &Path,
        wants_descendants: bool,
        callback: Callback,
    ) -> ListenerToken {
        let token = ListenerToken(self.next_token);
        self.next_token += 1;
        let id = self.overlay.materialize(path, self.seq);
        let node = self.overlay.node_mut(id);
        node.listeners.push(Listener {
            token,
            wants_descendants,
            watermark: self.seq,
            callback,
        });
        node.recompute_interest();
        node.watermark = node
            .listeners
            .iter()
            .map(|l| l.watermark)
            .min()
            .unwrap_or(node.watermark);
        debug!(path = %path, %token, wants_descendants, "listener added");
        token
    }

    /// Remove a listener registration
    ///
    /// The node is unlinked the moment its last listener leaves, unless
    /// it still holds pending work; then the flush engine unlinks it
    /// once the work drains.
    pub fn remove_listener(&mut self, path: &Path, token: ListenerToken) -> Result<()> {
        let id = self.overlay.node_at(path.as_str()).ok_or_else(|| {
            Error::ListenerState(format!("no listeners registered at path {:?}", path.as_str()))
        })?;
        let node = self.overlay.node_mut(id);
        let position = node
            .listeners
            .iter()
            .position(|l| l.token == token)
            .ok_or_else(|| {
                Error::ListenerState(format!("{} is not registered at {:?}", token, path.as_str()))
            })?;
        node.listeners.remove(position);
        node.recompute_interest();
        debug!(path = %path, %token, "listener removed");
        if node.listeners.is_empty() {
            self.overlay.release(id);
        }
        Ok(())
    }

    /// Mutate the value at `path` and file the resulting event
    ///
    /// Rejects a write whose value is identical to the current occupant:
    /// it cannot be told apart from a no-op. Does not flush.
    pub fn stage_set_data(&mut self, path: &Path, value: Value) -> Result<()> {
        if let Some(current) = resolve::get(&self.data, path) {
            if current.same_ref(&value) {
                return Err(Error::UnchangedValue {
                    path: path.as_str().to_string(),
                });
            }
        }
        let (next, old) = resolve::set(&self.data, path, value.clone());
        self.data = next;
        let seq = self.next_seq();
        trace!(path = %path, seq, "data changed");
        self.file(
            Event::DataChanged {
                path: path.clone(),
                old,
                new: value,
                seq,
            },
            None,
        );
        Ok(())
    }

    /// Replace the tree-wide metadata and file the broadcast event.
    /// Does not flush.
    pub fn stage_set_meta(&mut self, value: Value) -> Result<()> {
        if self.tree_meta.same_ref(&value) {
            return Err(Error::UnchangedValue {
                path: String::new(),
            });
        }
        let old = std::mem::replace(&mut self.tree_meta, value.clone());
        let seq = self.next_seq();
        trace!(seq, "tree meta changed");
        self.file(Event::TreeMetaChanged { old, new: value, seq }, None);
        Ok(())
    }

    /// Replace the per-path metadata map wholesale, filing one
    /// `MetaChanged` per differing path. Does not flush.
    ///
    /// The difference engine (circular policy `Error`) decides which
    /// paths actually changed; an error aborts before anything is filed.
    pub fn stage_set_meta_bulk(&mut self, next: IndexMap<String, Value>) -> Result<()> {
        let options = DiffOptions::default();
        let mut changes: Vec<(Path, Option<Value>, Option<Value>)> = Vec::new();
        for (path_str, old_value) in &self.node_meta {
            let path = Path::parse(path_str)?;
            match next.get(path_str) {
                Some(new_value) => {
                    if !diff(old_value, new_value, path_str, &options)?.is_empty() {
                        changes.push((path, Some(old_value.clone()), Some(new_value.clone())));
                    }
                }
                None => changes.push((path, Some(old_value.clone()), None)),
            }
        }
        for (path_str, new_value) in &next {
            if !self.node_meta.contains_key(path_str) {
                changes.push((Path::parse(path_str)?, None, Some(new_value.clone())));
            }
        }
        self.node_meta = next;
        trace!(count = changes.len(), "bulk meta replaced");
        for (path, old, new) in changes {
            let seq = self.next_seq();
            self.file(Event::MetaChanged { path, old, new, seq }, None);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn noop() -> Callback {
        Rc::new(RefCell::new(|_: &[Event]| {}))
    }

    #[test]
    fn test_add_listener_materializes_and_flags_interest() {
        let mut state = TreeState::new(Value::Null);
        let token = state.add_listener(&path(".a.b"), true, noop());
        let id = state.overlay.node_at(".a.b").unwrap();
        assert!(state.overlay.node(id).interested_in_descendants);
        assert_eq!(state.overlay.len(), 2);

        // A second, exact-only listener keeps the flag up
        let other = state.add_listener(&path(".a.b"), false, noop());
        assert!(state.overlay.node(id).interested_in_descendants);

        state.remove_listener(&path(".a.b"), token).unwrap();
        assert!(!state.overlay.node(id).interested_in_descendants);
        state.remove_listener(&path(".a.b"), other).unwrap();
        // Last listener gone: the node unlinks
        assert!(state.overlay.node_at(".a.b").is_none());
        assert_eq!(state.overlay.len(), 1);
    }

    #[test]
    fn test_remove_listener_twice_is_an_error() {
        let mut state = TreeState::new(Value::Null);
        let keep = state.add_listener(&path(".a"), false, noop());
        let token = state.add_listener(&path(".a"), false, noop());
        state.remove_listener(&path(".a"), token).unwrap();
        assert!(matches!(
            state.remove_listener(&path(".a"), token),
            Err(Error::ListenerState(_))
        ));
        // Removing at a path with no node at all is also misuse
        assert!(matches!(
            state.remove_listener(&path(".elsewhere"), keep),
            Err(Error::ListenerState(_))
        ));
    }

    #[test]
    fn test_stage_set_data_rejects_identical_value() {
        let mut state = TreeState::new(Value::Null);
        let value = Value::from("pika");
        state.stage_set_data(&path(".name"), value.clone()).unwrap();
        assert!(matches!(
            state.stage_set_data(&path(".name"), value),
            Err(Error::UnchangedValue { .. })
        ));
        // A fresh allocation with equal contents is a different identity
        let container = Value::list(vec![Value::from(1i64)]);
        state.stage_set_data(&path(".items"), container.clone()).unwrap();
        assert!(matches!(
            state.stage_set_data(&path(".items"), container.clone()),
            Err(Error::UnchangedValue { .. })
        ));
        let equal_but_new = Value::list(vec![Value::from(1i64)]);
        assert!(state.stage_set_data(&path(".items"), equal_but_new).is_ok());
    }

    #[test]
    fn test_stage_writes_advance_sequence_and_file_events() {
        let mut state = TreeState::new(Value::Null);
        state.add_listener(&path(""), true, noop());
        state.stage_set_data(&path(".a"), Value::from(1i64)).unwrap();
        state.stage_set_meta(Value::from("meta")).unwrap();
        assert_eq!(state.seq, 2);

        let root = state.overlay.root();
        assert_eq!(state.overlay.node(root).descendant.len(), 1);
        assert_eq!(state.overlay.node(root).tree_wide.len(), 1);
    }

    #[test]
    fn test_bulk_meta_emits_only_differing_paths() {
        let mut state = TreeState::new(Value::Null);
        state.add_listener(&path(""), true, noop());

        let mut first = IndexMap::new();
        first.insert(".a".to_string(), Value::from(1i64));
        first.insert(".b".to_string(), Value::from(2i64));
        state.stage_set_meta_bulk(first).unwrap();
        assert_eq!(state.seq, 2);

        let mut second = IndexMap::new();
        second.insert(".a".to_string(), Value::from(1i64)); // unchanged
        second.insert(".c".to_string(), Value::from(3i64)); // added
        state.stage_set_meta_bulk(second).unwrap();
        // .b removed and .c added; .a stays silent
        assert_eq!(state.seq, 4);
        assert_eq!(state.node_meta.len(), 2);
    }

    #[test]
    fn test_bulk_meta_circular_reference_propagates() {
        let mut state = TreeState::new(Value::Null);
        let mut shared_map = trellis_core::ValueMap::new();
        shared_map.insert("v".into(), Value::from(1i64));
        let shared = Value::map(shared_map);
        let mut outer = trellis_core::ValueMap::new();
        outer.insert("p".into(), shared.clone());
        outer.insert("q".into(), shared);

        let mut first = IndexMap::new();
        first.insert(".a".to_string(), Value::map(outer.clone()));
        state.stage_set_meta_bulk(first).unwrap();

        let mut second = IndexMap::new();
        second.insert(".a".to_string(), Value::map(outer));
        let result = state.stage_set_meta_bulk(second);
        assert!(matches!(
            result,
            Err(Error::Core(trellis_core::Error::CircularReference(_)))
        ));
    }
}

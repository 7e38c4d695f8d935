//! Path resolver: navigate and rewrite a value by dot-path
//!
//! `get` walks the value and returns `None` the moment an intermediate
//! container is absent; a merely-missing interior is never an error.
//! `set` rebuilds the spine from the root to the written slot and reuses
//! every untouched child `Rc`, which is what keeps sibling subtrees
//! identity-stable across writes.

use crate::path::{Path, Segment};
use crate::value::{Value, ValueMap};
use std::rc::Rc;

/// Read the value at `path`, `None` if anything along the way is missing
pub fn get<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut cur = root;
    for seg in path.segments() {
        cur = match cur {
            Value::Map(map) => map.get(seg.as_str())?,
            Value::List(list) => list.get(seg.index()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Write `value` at `path`, returning the new root and the previous
/// occupant of the terminal slot
///
/// Absent intermediates are auto-vivified: a list when the segment
/// addressing into the new container parses as a non-negative integer,
/// otherwise a map. Writing past the end of a list pads with nulls. An
/// intermediate whose shape cannot be indexed by its segment is replaced
/// by a fresh vivified container.
pub fn set(root: &Value, path: &Path, value: Value) -> (Value, Option<Value>) {
    set_in(Some(root), path.segments(), value)
}

fn set_in(cur: Option<&Value>, segs: &[Segment], value: Value) -> (Value, Option<Value>) {
    let Some((seg, rest)) = segs.split_first() else {
        return (value, cur.cloned());
    };
    match cur {
        Some(Value::Map(map)) => {
            let (child, old) = set_in(map.get(seg.as_str()), rest, value);
            let mut next = (**map).clone();
            next.insert(seg.as_str().to_string(), child);
            (Value::Map(Rc::new(next)), old)
        }
        Some(Value::List(list)) if seg.index().is_some() => {
            let i = seg.index().unwrap();
            let (child, old) = set_in(list.get(i), rest, value);
            let mut next = (**list).clone();
            if i < next.len() {
                next[i] = child;
            } else {
                next.resize(i, Value::Null);
                next.push(child);
            }
            (Value::List(Rc::new(next)), old)
        }
        // Absent, primitive, or a list addressed by a non-numeric key:
        // vivify a fresh container shaped for this segment.
        _ => {
            let (child, old) = set_in(None, rest, value);
            if let Some(i) = seg.index() {
                let mut next = vec![Value::Null; i];
                next.push(child);
                (Value::List(Rc::new(next)), old)
            } else {
                let mut next = ValueMap::new();
                next.insert(seg.as_str().to_string(), child);
                (Value::Map(Rc::new(next)), old)
            }
        }
    }
}

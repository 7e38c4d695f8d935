//! Difference engine: deep structural diff between two values
//!
//! Produces an ordered list of per-path records. Comparison is strict by
//! default; loose mode coerces across string/number/bool, treats null as
//! interchangeable with a missing key, and treats NaN as equal to NaN.
//!
//! Shared containers can make the traversal revisit an allocation (the
//! `Rc` model allows DAGs). The circular-reference policy decides what
//! happens then: `Error` raises immediately, `Ignore` treats a revisited
//! pair as equal when both sides were first seen at the same visit path,
//! and otherwise reports one wholesale change. The visit-path heuristic
//! is intentionally shallow; it compares where a container was first
//! encountered, not cycle shape.

use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// What happened at a diffed path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// Key present only on the new side
    Added,
    /// Key present only on the old side
    Removed,
    /// Present on both sides with differing values
    Changed,
}

/// One entry of a diff result
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRecord {
    /// Path of the differing slot, prefixed with the diff's base path
    pub path: String,
    /// Kind of difference
    pub kind: DiffKind,
    /// Value on the old side, if present
    pub old: Option<Value>,
    /// Value on the new side, if present
    pub new: Option<Value>,
}

/// Policy for revisited containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircularPolicy {
    /// Raise `Error::CircularReference` on the first revisit
    #[default]
    Error,
    /// Treat a revisited pair as equal if both sides were already
    /// visited at the same path, otherwise report a wholesale change
    Ignore,
}

/// Options controlling a diff run
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Coerce string/number/bool, null ≈ missing, NaN ≈ NaN
    pub loose: bool,
    /// What to do when a container is revisited
    pub circular: CircularPolicy,
}

/// Compute the ordered list of differences between `a` and `b`
///
/// `base_path` prefixes every record path; pass `""` to diff from the
/// root. `diff(a, a, ..)` is always empty.
pub fn diff(a: &Value, b: &Value, base_path: &str, options: &DiffOptions) -> Result<Vec<DiffRecord>> {
    let mut walker = Walker {
        options: *options,
        records: Vec::new(),
        visited_a: HashMap::new(),
        visited_b: HashMap::new(),
    };
    walker.diff_value(a, b, base_path)?;
    Ok(walker.records)
}

struct Walker {
    options: DiffOptions,
    records: Vec<DiffRecord>,
    // First-visit path per container allocation, one map per side
    visited_a: HashMap<usize, String>,
    visited_b: HashMap<usize, String>,
}

enum Visit {
    First,
    Equal,
    Changed,
}

impl Walker {
    fn diff_value(&mut self, a: &Value, b: &Value, path: &str) -> Result<()> {
        match (a, b) {
            (Value::Map(ma), Value::Map(mb)) => {
                match self.visit(a, b, path)? {
                    Visit::Equal => return Ok(()),
                    Visit::Changed => {
                        self.push(path, DiffKind::Changed, Some(a.clone()), Some(b.clone()));
                        return Ok(());
                    }
                    Visit::First => {}
                }
                for (key, va) in ma.iter() {
                    let child = child_path(path, key);
                    match mb.get(key) {
                        Some(vb) => self.diff_value(va, vb, &child)?,
                        None => {
                            if !(self.options.loose && va.is_null()) {
                                self.push(&child, DiffKind::Removed, Some(va.clone()), None);
                            }
                        }
                    }
                }
                for (key, vb) in mb.iter() {
                    if !ma.contains_key(key) && !(self.options.loose && vb.is_null()) {
                        let child = child_path(path, key);
                        self.push(&child, DiffKind::Added, None, Some(vb.clone()));
                    }
                }
                Ok(())
            }
            (Value::List(la), Value::List(lb)) => {
                match self.visit(a, b, path)? {
                    Visit::Equal => return Ok(()),
                    Visit::Changed => {
                        self.push(path, DiffKind::Changed, Some(a.clone()), Some(b.clone()));
                        return Ok(());
                    }
                    Visit::First => {}
                }
                if la.len() != lb.len() {
                    // Count drift collapses into one record for the list
                    self.push(path, DiffKind::Changed, Some(a.clone()), Some(b.clone()));
                    return Ok(());
                }
                for (i, (va, vb)) in la.iter().zip(lb.iter()).enumerate() {
                    let child = child_path(path, &i.to_string());
                    self.diff_value(va, vb, &child)?;
                }
                Ok(())
            }
            _ => {
                let equal = if self.options.loose {
                    loose_eq(a, b)
                } else {
                    strict_eq(a, b)
                };
                if !equal {
                    self.push(path, DiffKind::Changed, Some(a.clone()), Some(b.clone()));
                }
                Ok(())
            }
        }
    }

    /// Record the first visit of a container pair, or resolve a revisit
    /// according to the circular-reference policy
    fn visit(&mut self, a: &Value, b: &Value, path: &str) -> Result<Visit> {
        let pa = container_ptr(a);
        let pb = container_ptr(b);
        let seen_a = self.visited_a.get(&pa).cloned();
        let seen_b = self.visited_b.get(&pb).cloned();
        if seen_a.is_none() && seen_b.is_none() {
            self.visited_a.insert(pa, path.to_string());
            self.visited_b.insert(pb, path.to_string());
            return Ok(Visit::First);
        }
        match self.options.circular {
            CircularPolicy::Error => Err(Error::CircularReference(path.to_string())),
            CircularPolicy::Ignore => {
                if seen_a.is_some() && seen_a == seen_b {
                    Ok(Visit::Equal)
                } else {
                    Ok(Visit::Changed)
                }
            }
        }
    }

    fn push(&mut self, path: &str, kind: DiffKind, old: Option<Value>, new: Option<Value>) {
        self.records.push(DiffRecord {
            path: path.to_string(),
            kind,
            old,
            new,
        });
    }
}

fn child_path(base: &str, key: &str) -> String {
    format!("{}.{}", base, key)
}

fn container_ptr(v: &Value) -> usize {
    match v {
        Value::List(l) => Rc::as_ptr(l) as usize,
        Value::Map(m) => Rc::as_ptr(m) as *const u8 as usize,
        _ => 0,
    }
}

// Strict primitive equality: same variant, same value, NaN unequal to
// itself. Mismatched kinds (including container vs primitive) differ.
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y,
        _ => a == b,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if strict_eq(a, b) {
        return true;
    }
    if let (Value::Float(x), Value::Float(y)) = (a, b) {
        if x.is_nan() && y.is_nan() {
            return true;
        }
    }
    match (coerce_num(a), coerce_num(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn coerce_num(v: &Value) -> Option<f64> {
    match v {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::resolve;
    use crate::value::ValueMap;

    fn map(entries: &[(&str, Value)]) -> Value {
        let mut m = ValueMap::new();
        for (k, v) in entries {
            m.insert((*k).to_string(), v.clone());
        }
        Value::map(m)
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let a = map(&[
            ("x", Value::from(1i64)),
            ("y", Value::list(vec![Value::from("a"), Value::from("b")])),
        ]);
        let records = diff(&a, &a, "", &DiffOptions::default()).unwrap();
        assert!(records.is_empty());

        let b = a.clone();
        assert!(diff(&a, &b, "", &DiffOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_diff_added_removed_changed() {
        let a = map(&[("keep", Value::from(1i64)), ("gone", Value::from(2i64)), ("edit", Value::from(3i64))]);
        let b = map(&[("keep", Value::from(1i64)), ("edit", Value::from(4i64)), ("fresh", Value::from(5i64))]);
        let records = diff(&a, &b, "", &DiffOptions::default()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].path, ".gone");
        assert_eq!(records[0].kind, DiffKind::Removed);
        assert_eq!(records[1].path, ".edit");
        assert_eq!(records[1].kind, DiffKind::Changed);
        assert_eq!(records[1].new, Some(Value::from(4i64)));
        assert_eq!(records[2].path, ".fresh");
        assert_eq!(records[2].kind, DiffKind::Added);
    }

    #[test]
    fn test_diff_nested_paths_and_base_path() {
        let a = map(&[("inner", map(&[("v", Value::from(1i64))]))]);
        let b = map(&[("inner", map(&[("v", Value::from(2i64))]))]);
        let records = diff(&a, &b, ".meta", &DiffOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, ".meta.inner.v");
    }

    #[test]
    fn test_diff_list_count_drift_is_single_change() {
        let a = map(&[("items", Value::list(vec![Value::from(1i64)]))]);
        let b = map(&[("items", Value::list(vec![Value::from(1i64), Value::from(2i64)]))]);
        let records = diff(&a, &b, "", &DiffOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, ".items");
        assert_eq!(records[0].kind, DiffKind::Changed);
    }

    #[test]
    fn test_diff_list_elementwise_when_same_length() {
        let a = Value::list(vec![Value::from(1i64), Value::from(2i64)]);
        let b = Value::list(vec![Value::from(1i64), Value::from(9i64)]);
        let records = diff(&a, &b, "", &DiffOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, ".1");
    }

    #[test]
    fn test_diff_kind_mismatch_is_wholesale_change() {
        let a = map(&[("x", Value::list(vec![]))]);
        let b = map(&[("x", Value::from(1i64))]);
        let records = diff(&a, &b, "", &DiffOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, ".x");
        assert_eq!(records[0].kind, DiffKind::Changed);
    }

    #[test]
    fn test_strict_nan_differs() {
        let a = map(&[("x", Value::from(f64::NAN))]);
        let b = map(&[("x", Value::from(f64::NAN))]);
        let records = diff(&a, &b, "", &DiffOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_loose_mode_coercions() {
        let opts = DiffOptions {
            loose: true,
            ..Default::default()
        };
        let a = map(&[
            ("n", Value::from("1")),
            ("b", Value::from(true)),
            ("f", Value::from(1i64)),
            ("nan", Value::from(f64::NAN)),
            ("gone", Value::Null),
        ]);
        let b = map(&[
            ("n", Value::from(1i64)),
            ("b", Value::from(1i64)),
            ("f", Value::from(1.0f64)),
            ("nan", Value::from(f64::NAN)),
            ("fresh", Value::Null),
        ]);
        // "1" ≈ 1, true ≈ 1, 1 ≈ 1.0, NaN ≈ NaN, null ≈ missing
        let records = diff(&a, &b, "", &opts).unwrap();
        assert!(records.is_empty(), "unexpected records: {:?}", records);

        // Strict mode disagrees on every one of them
        let strict = diff(&a, &b, "", &DiffOptions::default()).unwrap();
        assert_eq!(strict.len(), 6);
    }

    #[test]
    fn test_circular_error_policy() {
        // The same allocation reachable at two paths triggers the policy
        let shared = map(&[("v", Value::from(1i64))]);
        let a = map(&[("p", shared.clone()), ("q", shared.clone())]);
        let b = map(&[("p", map(&[("v", Value::from(1i64))])), ("q", map(&[("v", Value::from(1i64))]))]);
        let result = diff(&a, &b, "", &DiffOptions::default());
        assert!(matches!(result, Err(Error::CircularReference(p)) if p == ".q"));
    }

    #[test]
    fn test_circular_ignore_equal_visit_paths() {
        let opts = DiffOptions {
            loose: false,
            circular: CircularPolicy::Ignore,
        };
        let shared_a = map(&[("v", Value::from(1i64))]);
        let shared_b = map(&[("v", Value::from(1i64))]);
        // Both sides share their own allocation at .p and .q: the
        // revisit pair was first seen at the same path, so it is equal
        let a = map(&[("p", shared_a.clone()), ("q", shared_a.clone())]);
        let b = map(&[("p", shared_b.clone()), ("q", shared_b.clone())]);
        assert!(diff(&a, &b, "", &opts).unwrap().is_empty());
    }

    #[test]
    fn test_circular_ignore_one_sided_revisit_is_change() {
        let opts = DiffOptions {
            loose: false,
            circular: CircularPolicy::Ignore,
        };
        let shared = map(&[("v", Value::from(1i64))]);
        let a = map(&[("p", shared.clone()), ("q", shared.clone())]);
        // b has distinct allocations, so only the a side revisits
        let b = map(&[("p", map(&[("v", Value::from(1i64))])), ("q", map(&[("v", Value::from(1i64))]))]);
        let records = diff(&a, &b, "", &opts).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, ".q");
        assert_eq!(records[0].kind, DiffKind::Changed);
    }

    // Apply every record onto a copy of `a`; the result must deep-equal `b`.
    fn apply(records: &[DiffRecord], base: &Value) -> Value {
        let mut cur = base.clone();
        for rec in records {
            let path = Path::parse(&rec.path).unwrap();
            match rec.kind {
                DiffKind::Added | DiffKind::Changed => {
                    let (next, _) = resolve::set(&cur, &path, rec.new.clone().unwrap());
                    cur = next;
                }
                DiffKind::Removed => {
                    let parent = path.parent().unwrap();
                    let key = path.segments().last().unwrap().as_str().to_string();
                    let mut owner = resolve::get(&cur, &parent)
                        .and_then(|v| v.as_map().cloned())
                        .unwrap();
                    owner.shift_remove(&key);
                    let (next, _) = resolve::set(&cur, &parent, Value::map(owner));
                    cur = next;
                }
            }
        }
        cur
    }

    #[test]
    fn test_diff_round_trip() {
        let a = map(&[
            ("keep", Value::from("same")),
            ("gone", Value::from(1i64)),
            ("edit", map(&[("deep", Value::from(2i64))])),
            ("items", Value::list(vec![Value::from(1i64), Value::from(2i64)])),
        ]);
        let b = map(&[
            ("keep", Value::from("same")),
            ("edit", map(&[("deep", Value::from(3i64))])),
            ("items", Value::list(vec![Value::from(9i64)])),
            ("fresh", Value::from(true)),
        ]);
        let records = diff(&a, &b, "", &DiffOptions::default()).unwrap();
        let rebuilt = apply(&records, &a);
        assert_eq!(rebuilt, b);
    }
}

//! Dot-path parsing and classification
//!
//! A path addresses a slot in a nested value: the empty string is the
//! root, anything else is a sequence of `.`-prefixed segments
//! (`.articles.0.name`). Segments are parsed once and cached; numeric
//! segments double as sequence indices.

use crate::error::{Error, Result};
use std::fmt;

/// Path segment separator
pub const SEPARATOR: char = '.';

/// A single path segment with its cached sequence-index parse
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    raw: String,
    index: Option<usize>,
}

impl Segment {
    fn new(raw: &str) -> Self {
        Self {
            index: raw.parse::<usize>().ok(),
            raw: raw.to_string(),
        }
    }

    /// The segment as a map key
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The segment as a sequence index, if it parses as one
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

/// A parsed path: canonical raw string plus cached segments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    raw: String,
    segments: Vec<Segment>,
}

impl Path {
    /// The root path (empty string, no segments)
    pub fn root() -> Self {
        Self {
            raw: String::new(),
            segments: Vec::new(),
        }
    }

    /// Parse a path string
    ///
    /// The empty string is the root. A non-empty path must split into at
    /// least two parts on the separator; the part before the first
    /// separator is discarded, so the canonical form is `.`-prefixed.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        if parts.len() < 2 {
            return Err(Error::MalformedPath(raw.to_string()));
        }
        let segments: Vec<Segment> = parts[1..].iter().map(|p| Segment::new(p)).collect();
        Ok(Self::from_segments(segments))
    }

    fn from_segments(segments: Vec<Segment>) -> Self {
        let mut raw = String::new();
        for seg in &segments {
            raw.push(SEPARATOR);
            raw.push_str(seg.as_str());
        }
        Self { raw, segments }
    }

    /// The canonical path string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path one segment shorter, or None at the root
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self::from_segments(segments))
    }

    /// Append a relative sub-path
    pub fn join(&self, sub: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(sub.segments.iter().cloned());
        Self::from_segments(segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// How one path relates to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRelation {
    /// Same path
    Exact,
    /// `a` is a proper ancestor of `b`
    Parent,
    /// `a` lies strictly below `b`
    Child,
    /// Neither is a prefix of the other
    Unrelated,
}

/// Classify `a` relative to `b` by segment-wise prefix comparison
pub fn classify(a: &Path, b: &Path) -> PathRelation {
    let common = a
        .segments()
        .iter()
        .zip(b.segments())
        .take_while(|(x, y)| x.as_str() == y.as_str())
        .count();
    match (common == a.len(), common == b.len()) {
        (true, true) => PathRelation::Exact,
        (true, false) => PathRelation::Parent,
        (false, true) => PathRelation::Child,
        (false, false) => PathRelation::Unrelated,
    }
}

//! Leaf provenance: a side table from leaf paths to pre-substitution text.
//!
//! The resolved tree stays a plain JSON value; everything needed to restore
//! markers at dump time lives here instead.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields that identify an element of an array of objects, in priority order.
pub const IDENTITY_FIELDS: &[&str] = &["name", "identifier", "template"];

/// One step from a node to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSegment {
    /// Member of an object.
    Key(String),
    /// Array element without an identifying field.
    Index(usize),
    /// Array element addressed by the resolved value of an identifying field.
    Item { field: String, value: String },
}

impl PathSegment {
    /// Segment addressing `element`, the `index`-th item of an array.
    ///
    /// Objects carrying one of [`IDENTITY_FIELDS`] as a string are addressed
    /// by identity so the segment survives reordering of the array.
    pub fn element(element: &Value, index: usize) -> Self {
        if let Value::Object(map) = element {
            for field in IDENTITY_FIELDS {
                if let Some(Value::String(value)) = map.get(*field) {
                    return Self::Item {
                        field: (*field).to_string(),
                        value: value.clone(),
                    };
                }
            }
        }
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{}", key),
            Self::Index(index) => write!(f, "{}", index),
            Self::Item { field, value } => write!(f, "[{}={}]", field, value),
        }
    }
}

/// Path of a node within a document or asset bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeafPath(Vec<PathSegment>);

impl LeafPath {
    /// The document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Path of a direct child of this node.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// Path of an object member of this node.
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.child(PathSegment::Key(key.into()))
    }

    /// Prepend `prefix` to this path.
    pub fn prefixed(&self, prefix: &LeafPath) -> Self {
        let mut segments = prefix.0.clone();
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }
}

impl fmt::Display for LeafPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.0 {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// How a recorded leaf was substituted, and so how to recompute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionMode {
    /// A string leaf of a document: whole-value or embedded.
    Leaf,
    /// The body of an auxiliary file: embedded only.
    Text,
}

/// Original template text of a substituted leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub original_text: String,
    pub resolved_value: Value,
    pub mode: SubstitutionMode,
}

impl ProvenanceEntry {
    /// Entry for a document string leaf.
    pub fn leaf(original_text: impl Into<String>, resolved_value: Value) -> Self {
        Self {
            original_text: original_text.into(),
            resolved_value,
            mode: SubstitutionMode::Leaf,
        }
    }

    /// Entry for an auxiliary file body.
    pub fn text(original_text: impl Into<String>, resolved_value: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            resolved_value: Value::String(resolved_value.into()),
            mode: SubstitutionMode::Text,
        }
    }
}

/// Index of provenance entries keyed by leaf path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvenanceIndex {
    entries: BTreeMap<LeafPath, ProvenanceEntry>,
}

impl ProvenanceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entry` for `path`, replacing any earlier one.
    pub fn record(&mut self, path: LeafPath, entry: ProvenanceEntry) {
        self.entries.insert(path, entry);
    }

    pub fn get(&self, path: &LeafPath) -> Option<&ProvenanceEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &LeafPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Remove and return the entry for `path`.
    pub fn take(&mut self, path: &LeafPath) -> Option<ProvenanceEntry> {
        self.entries.remove(path)
    }

    /// Move every entry of `other` into this index under `prefix`.
    pub fn extend_prefixed(&mut self, prefix: &LeafPath, other: ProvenanceIndex) {
        for (path, entry) in other.entries {
            self.entries.insert(path.prefixed(prefix), entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&LeafPath, &ProvenanceEntry)> {
        self.entries.iter()
    }
}

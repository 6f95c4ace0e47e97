//! Keyword substitution.
//!
//! Markers have the form `@@NAME@@` or `##NAME##` with `NAME` in
//! `[A-Za-z0-9_]+`. A string leaf whose trimmed text is exactly one marker is
//! replaced by the mapped value with its native type (whole-value mode).
//! Any other leaf has each marker spliced in as text (embedded mode): `@@`
//! markers render their value as JSON text, `##` markers render strings raw.
//! Structured values render as compact JSON under both delimiters.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DocumentError, DocumentResult};
use crate::include::{pointer_child, IncludeOrigins};
use crate::provenance::{LeafPath, PathSegment, ProvenanceEntry, ProvenanceIndex, SubstitutionMode};

/// Name to value table used to resolve markers.
pub type KeywordMappings = BTreeMap<String, Value>;

/// Marker delimiter family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `@@NAME@@`
    At,
    /// `##NAME##`
    Hash,
}

impl Delimiter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::At => "@@",
            Self::Hash => "##",
        }
    }
}

/// A piece of an embedded template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Marker { name: String, delimiter: Delimiter },
}

/// A tokenized string leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    /// The whole trimmed leaf is a single marker.
    WholeValue { name: String, delimiter: Delimiter },
    /// Literal text interleaved with zero or more markers.
    Embedded { segments: Vec<Segment> },
}

impl Template {
    /// Whether the template references any keyword at all.
    pub fn has_markers(&self) -> bool {
        match self {
            Self::WholeValue { .. } => true,
            Self::Embedded { segments } => segments
                .iter()
                .any(|s| matches!(s, Segment::Marker { .. })),
        }
    }
}

/// Result of substituting a document tree.
#[derive(Debug, Clone)]
pub struct Substituted {
    pub value: Value,
    pub provenance: ProvenanceIndex,
}

/// Provenance gathered while walking a subtree. Paths are stored leaf-first
/// and reversed once the walk reaches the root.
type Recorded = Vec<(Vec<PathSegment>, ProvenanceEntry)>;

/// Keyword substitution engine.
pub struct KeywordEngine {
    mappings: KeywordMappings,
    preserve_keywords: bool,
    marker_pattern: Regex,
}

impl KeywordEngine {
    /// Create an engine over `mappings`.
    ///
    /// With `preserve_keywords` on, an unresolved whole-value marker is kept
    /// as text instead of failing the load.
    pub fn new(mappings: KeywordMappings, preserve_keywords: bool) -> Self {
        Self {
            mappings,
            preserve_keywords,
            // Match @@NAME@@ or ##NAME##
            marker_pattern: Regex::new(r"@@([A-Za-z0-9_]+)@@|##([A-Za-z0-9_]+)##").unwrap(),
        }
    }

    /// Keyword name to replacement value.
    pub fn mappings(&self) -> &KeywordMappings {
        &self.mappings
    }

    pub fn preserve_keywords(&self) -> bool {
        self.preserve_keywords
    }

    /// Tokenize a string leaf in a single pass.
    pub fn tokenize(&self, text: &str) -> Template {
        let trimmed = text.trim();
        if let Some(caps) = self.marker_pattern.captures(trimmed) {
            let whole = caps.get(0).map_or(false, |m| m.start() == 0 && m.end() == trimmed.len());
            if whole {
                let (name, delimiter) = marker_parts(&caps);
                return Template::WholeValue { name, delimiter };
            }
        }

        let mut segments = Vec::new();
        let mut last = 0;
        for caps in self.marker_pattern.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if m.start() > last {
                segments.push(Segment::Literal(text[last..m.start()].to_string()));
            }
            let (name, delimiter) = marker_parts(&caps);
            segments.push(Segment::Marker { name, delimiter });
            last = m.end();
        }
        if last < text.len() {
            segments.push(Segment::Literal(text[last..].to_string()));
        }

        Template::Embedded { segments }
    }

    /// Substitute every string leaf of `tree`.
    ///
    /// `source` names the file in errors. Object keys are never substituted.
    pub fn substitute(&self, tree: Value, source: &Path) -> DocumentResult<Substituted> {
        self.substitute_included(tree, source, &IncludeOrigins::new())
    }

    /// Like [`substitute`](Self::substitute) for a tree assembled from
    /// several files; errors name the file a leaf came from.
    pub fn substitute_included(
        &self,
        tree: Value,
        source: &Path,
        origins: &IncludeOrigins,
    ) -> DocumentResult<Substituted> {
        let mut recorded = Recorded::new();
        let walker = Walker {
            engine: self,
            source,
            origins,
        };
        let value = walker.walk(tree, "", &mut recorded)?;

        let mut provenance = ProvenanceIndex::new();
        for (mut segments, entry) in recorded {
            segments.reverse();
            provenance.record(LeafPath::from_segments(segments), entry);
        }

        debug!(
            "Substituted {} keyword leaves in {:?}",
            provenance.len(),
            source
        );
        Ok(Substituted { value, provenance })
    }

    fn substitute_leaf(
        &self,
        text: String,
        source: &Path,
    ) -> DocumentResult<(Value, Option<ProvenanceEntry>)> {
        match self.tokenize(&text) {
            Template::WholeValue { name, .. } => match self.mappings.get(&name) {
                Some(value) => {
                    let entry = ProvenanceEntry::leaf(text, value.clone());
                    Ok((value.clone(), Some(entry)))
                }
                None if self.preserve_keywords => {
                    debug!("Keeping unresolved keyword {} in {:?}", name, source);
                    let kept = Value::String(text.clone());
                    Ok((kept.clone(), Some(ProvenanceEntry::leaf(text, kept))))
                }
                None => Err(DocumentError::UnresolvedKeyword {
                    name,
                    file: source.to_path_buf(),
                }),
            },
            Template::Embedded { segments } => {
                if !segments.iter().any(|s| matches!(s, Segment::Marker { .. })) {
                    return Ok((Value::String(text), None));
                }
                let rendered = self.render(&segments);
                if rendered == text {
                    return Ok((Value::String(text), None));
                }
                let value = Value::String(rendered);
                Ok((value.clone(), Some(ProvenanceEntry::leaf(text, value))))
            }
        }
    }

    /// Render free text (an auxiliary file body) in embedded mode only.
    pub fn substitute_text(&self, text: &str) -> String {
        match self.tokenize(text) {
            Template::Embedded { segments } => self.render(&segments),
            Template::WholeValue { name, delimiter } => {
                let leading = &text[..text.len() - text.trim_start().len()];
                let trailing = &text[text.trim_end().len()..];
                format!("{}{}{}", leading, self.render_marker(&name, delimiter), trailing)
            }
        }
    }

    /// Recompute the value `original_text` produces under the current mappings.
    ///
    /// Never fails: an unresolved whole-value marker evaluates to its own text.
    pub fn evaluate(&self, original_text: &str, mode: SubstitutionMode) -> Value {
        match mode {
            SubstitutionMode::Text => Value::String(self.substitute_text(original_text)),
            SubstitutionMode::Leaf => match self.tokenize(original_text) {
                Template::WholeValue { name, .. } => self
                    .mappings
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| Value::String(original_text.to_string())),
                Template::Embedded { segments } => Value::String(self.render(&segments)),
            },
        }
    }

    /// Decide what to write for the leaf at `path`.
    ///
    /// When the template recorded for `path` still evaluates to `candidate`,
    /// the template text is returned; otherwise `candidate` is. The entry is
    /// consumed either way.
    pub fn reconcile(&self, path: &LeafPath, candidate: Value, index: &mut ProvenanceIndex) -> Value {
        let Some(entry) = index.take(path) else {
            return candidate;
        };

        let expected = self.evaluate(&entry.original_text, entry.mode);
        if expected == candidate {
            debug!("Preserving keyword template at {}", path);
            Value::String(entry.original_text)
        } else {
            debug!("Observed value at {} diverges from its template", path);
            candidate
        }
    }

    /// Reconcile every node of `value` rooted at `path`.
    pub fn reconcile_tree(&self, path: &LeafPath, value: Value, index: &mut ProvenanceIndex) -> Value {
        if index.is_empty() {
            return value;
        }
        if index.contains(path) {
            return self.reconcile(path, value, index);
        }

        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, child)| {
                        let child_path = path.key(key.clone());
                        let child = self.reconcile_tree(&child_path, child, index);
                        (key, child)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let child_path = path.child(PathSegment::element(&item, i));
                        self.reconcile_tree(&child_path, item, index)
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    fn render(&self, segments: &[Segment]) -> String {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Marker { name, delimiter } => {
                    out.push_str(&self.render_marker(name, *delimiter))
                }
            }
        }
        out
    }

    fn render_marker(&self, name: &str, delimiter: Delimiter) -> String {
        match (self.mappings.get(name), delimiter) {
            (None, d) => format!("{0}{1}{0}", d.as_str(), name),
            (Some(Value::String(s)), Delimiter::Hash) => s.clone(),
            (Some(value), _) => value.to_string(),
        }
    }
}

/// One substitution pass over a resolved tree.
struct Walker<'a> {
    engine: &'a KeywordEngine,
    source: &'a Path,
    origins: &'a IncludeOrigins,
}

impl Walker<'_> {
    /// Depth-first, post-order walk: children are resolved before their
    /// array identity is computed. `pointer` locates `node` in the tree.
    fn walk(&self, node: Value, pointer: &str, recorded: &mut Recorded) -> DocumentResult<Value> {
        match node {
            Value::String(text) => {
                let file = self.origins.file_for(pointer, self.source);
                let (value, entry) = self.engine.substitute_leaf(text, file)?;
                if let Some(entry) = entry {
                    recorded.push((Vec::new(), entry));
                }
                Ok(value)
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let start = recorded.len();
                    let child = pointer_child(pointer, &index.to_string());
                    let resolved = self.walk(item, &child, recorded)?;
                    let segment = PathSegment::element(&resolved, index);
                    for (path, _) in &mut recorded[start..] {
                        path.push(segment.clone());
                    }
                    out.push(resolved);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    let start = recorded.len();
                    let child_pointer = pointer_child(pointer, &key);
                    let resolved = self.walk(child, &child_pointer, recorded)?;
                    for (path, _) in &mut recorded[start..] {
                        path.push(PathSegment::Key(key.clone()));
                    }
                    out.insert(key, resolved);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other),
        }
    }
}

fn marker_parts(caps: &regex::Captures<'_>) -> (String, Delimiter) {
    match (caps.get(1), caps.get(2)) {
        (Some(name), _) => (name.as_str().to_string(), Delimiter::At),
        (None, Some(name)) => (name.as_str().to_string(), Delimiter::Hash),
        (None, None) => (String::new(), Delimiter::At),
    }
}

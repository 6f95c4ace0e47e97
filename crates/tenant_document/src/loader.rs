//! Document loading: read, resolve includes, substitute keywords.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{DocumentError, DocumentResult};
use crate::include::{absolutize, IncludeResolver};
use crate::keywords::KeywordEngine;
use crate::provenance::{ProvenanceEntry, ProvenanceIndex};

/// A fully resolved document and the provenance of its substituted leaves.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Absolute path of the top-level file.
    pub path: PathBuf,
    /// Directive-free, keyword-resolved tree.
    pub value: Value,
    /// Provenance keyed by leaf path relative to `value`.
    pub provenance: ProvenanceIndex,
}

/// Body of an auxiliary file after keyword substitution.
#[derive(Debug, Clone)]
pub struct RenderedText {
    pub text: String,
    /// Present when substitution changed the text.
    pub provenance: Option<ProvenanceEntry>,
}

/// Document loader composing include resolution and keyword substitution.
pub struct DocumentLoader {
    engine: KeywordEngine,
}

impl DocumentLoader {
    pub fn new(engine: KeywordEngine) -> Self {
        Self { engine }
    }

    /// The keyword engine, shared with auxiliary file loading and dump.
    pub fn engine(&self) -> &KeywordEngine {
        &self.engine
    }

    /// Load a configuration document.
    ///
    /// Structural errors (missing or circular includes) abort before any
    /// substitution runs.
    pub fn load(&self, path: impl AsRef<Path>) -> DocumentResult<LoadedDocument> {
        let path = absolutize(path.as_ref())?;
        info!("Loading document {:?}", path);

        let (raw, origins) = IncludeResolver::resolve_file_with_origins(&path)?;
        let substituted = self.engine.substitute_included(raw, &path, &origins)?;

        Ok(LoadedDocument {
            path,
            value: substituted.value,
            provenance: substituted.provenance,
        })
    }

    /// Read an auxiliary file (a script or code body) and substitute keywords
    /// in its text.
    pub fn load_text(&self, path: impl AsRef<Path>) -> DocumentResult<RenderedText> {
        let path = path.as_ref();
        debug!("Reading auxiliary file {:?}", path);

        let original = fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let text = self.engine.substitute_text(&original);
        let provenance = (text != original).then(|| ProvenanceEntry::text(original, text.clone()));

        Ok(RenderedText { text, provenance })
    }
}

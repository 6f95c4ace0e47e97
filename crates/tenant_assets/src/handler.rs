//! The asset handler contract.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use tenant_document::{DocumentLoader, LeafPath, ProvenanceIndex};

use crate::bundle::AssetBundle;
use crate::error::AssetResult;

/// On-disk layout of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// A single YAML document, optionally split with `!include`.
    #[default]
    Yaml,
    /// One directory per resource type, one file per resource.
    Directory,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Directory => "directory",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "directory" | "dir" => Ok(Self::Directory),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

/// Whether a resource type is a single object or a list of named entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetShape {
    Singleton,
    Collection,
}

/// Client id to client name, captured before identifiers are stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossReferences {
    client_names: BTreeMap<String, String>,
}

impl CrossReferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_client(&mut self, client_id: impl Into<String>, name: impl Into<String>) {
        self.client_names.insert(client_id.into(), name.into());
    }

    /// Name recorded for `client_id`.
    pub fn client_name(&self, client_id: &str) -> Option<&str> {
        self.client_names.get(client_id).map(|s| s.as_str())
    }

    pub fn client_count(&self) -> usize {
        self.client_names.len()
    }

    /// Name for `client_id`, or the id itself when unknown.
    pub fn client_name_or_id<'a>(&'a self, client_id: &'a str) -> &'a str {
        self.client_name(client_id).unwrap_or(client_id)
    }
}

/// Everything a handler may use while loading.
pub struct LoadContext<'a> {
    loader: &'a DocumentLoader,
    format: Format,
    root: &'a Path,
    provenance: &'a mut ProvenanceIndex,
}

impl<'a> LoadContext<'a> {
    /// `root` is the directory of the YAML document, or the configuration
    /// directory in directory format.
    pub fn new(
        loader: &'a DocumentLoader,
        format: Format,
        root: &'a Path,
        provenance: &'a mut ProvenanceIndex,
    ) -> Self {
        Self {
            loader,
            format,
            root,
            provenance,
        }
    }

    /// Format of the configuration being loaded.
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn root(&self) -> &Path {
        self.root
    }

    /// Base directory that auxiliary file references of `directory` resolve
    /// against.
    pub fn aux_base(&self, directory: &str) -> PathBuf {
        match self.format {
            Format::Yaml => self.root.to_path_buf(),
            Format::Directory => self.root.join(directory),
        }
    }

    /// Read an auxiliary file, substitute its keywords and record its
    /// provenance at `leaf`.
    pub fn read_aux(&mut self, directory: &str, reference: &str, leaf: &LeafPath) -> AssetResult<String> {
        let path = self.aux_base(directory).join(reference);
        debug!("Reading {} for {}", path.display(), leaf);

        let rendered = self.loader.load_text(&path)?;
        if let Some(entry) = rendered.provenance {
            self.provenance.record(leaf.clone(), entry);
        }
        Ok(rendered.text)
    }
}

/// Everything a handler may use while saving.
pub struct SaveContext<'a> {
    pub format: Format,
    pub cross_references: &'a CrossReferences,
}

/// A file produced by a handler, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: PathBuf,
    pub contents: String,
}

impl FileWrite {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// Output of one handler's save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileWriteSet {
    /// Section of the YAML document owned by the handler (YAML format).
    pub fragment: Option<Value>,
    /// Files to write: resource files (directory format) or auxiliary code.
    pub files: Vec<FileWrite>,
}

impl FileWriteSet {
    pub fn is_empty(&self) -> bool {
        self.fragment.is_none() && self.files.is_empty()
    }
}

/// A per-resource-type handler.
///
/// `load` only reads auxiliary files it references and returns `None` for a
/// resource type absent from the document. `save` is deterministic for a
/// given bundle and cross-reference snapshot.
pub trait AssetHandler: Send + Sync {
    /// Key of the resource type in the bundle and the YAML document.
    fn resource_type(&self) -> &str;

    /// Directory name (collections) or file stem (singletons) on disk.
    fn directory(&self) -> &str;

    fn shape(&self) -> AssetShape;

    /// Remote-only identifier fields removed on dump.
    fn identifier_fields(&self) -> &[&str] {
        &["id"]
    }

    /// Name of a collection entry, used by instance exclusion rules.
    fn instance_name<'v>(&self, item: &'v Value) -> Option<&'v str> {
        item.get("name").and_then(Value::as_str)
    }

    /// Whether `save` writes client ids as names, needing a cross-reference
    /// snapshot.
    fn uses_client_refs(&self) -> bool {
        false
    }

    fn load(&self, document: &Value, ctx: &mut LoadContext<'_>) -> AssetResult<Option<Value>>;

    fn save(&self, bundle: &AssetBundle, ctx: &SaveContext<'_>) -> AssetResult<FileWriteSet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("YAML".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("directory".parse::<Format>().unwrap(), Format::Directory);
        assert!("xml".parse::<Format>().is_err());
    }

    #[test]
    fn test_cross_reference_fallback() {
        let mut xrefs = CrossReferences::new();
        xrefs.insert_client("abc", "My App");
        assert_eq!(xrefs.client_name_or_id("abc"), "My App");
        assert_eq!(xrefs.client_name_or_id("zzz"), "zzz");
    }
}

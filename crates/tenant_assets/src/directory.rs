//! Directory format: assemble per-resource files into one document.
//!
//! Collections live in `<root>/<directory>/*.{json,yaml,yml}`, one resource
//! per file; singletons live in `<root>/<directory>.{json,yaml,yml}`. Each
//! file is loaded on its own (includes and keywords resolved relative to it)
//! and its provenance is re-rooted under the resource's path in the
//! assembled document.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};
use walkdir::WalkDir;

use tenant_document::{DocumentLoader, LeafPath, PathSegment, ProvenanceIndex};

use crate::error::AssetResult;
use crate::handler::{AssetHandler, AssetShape};

const DOCUMENT_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// The assembled document and its provenance.
#[derive(Debug, Clone, Default)]
pub struct AssembledDocument {
    pub value: Value,
    pub provenance: ProvenanceIndex,
}

/// Reader for the directory format.
pub struct DirectoryReader<'a> {
    root: &'a Path,
    loader: &'a DocumentLoader,
}

impl<'a> DirectoryReader<'a> {
    pub fn new(root: &'a Path, loader: &'a DocumentLoader) -> Self {
        Self { root, loader }
    }

    /// Assemble the files belonging to `handlers` into one document.
    pub fn assemble<'h>(
        &self,
        handlers: impl IntoIterator<Item = &'h dyn AssetHandler>,
    ) -> AssetResult<AssembledDocument> {
        let mut document = Map::new();
        let mut provenance = ProvenanceIndex::new();

        for handler in handlers {
            let resource_type = handler.resource_type();
            let base = LeafPath::root().key(resource_type);

            match handler.shape() {
                AssetShape::Singleton => {
                    let Some(path) = self.singleton_file(handler.directory()) else {
                        continue;
                    };
                    let loaded = self.loader.load(&path)?;
                    provenance.extend_prefixed(&base, loaded.provenance);
                    document.insert(resource_type.to_string(), loaded.value);
                }
                AssetShape::Collection => {
                    let dir = self.root.join(handler.directory());
                    if !dir.is_dir() {
                        continue;
                    }
                    let mut items = Vec::new();
                    for path in document_files(&dir) {
                        let loaded = self.loader.load(&path)?;
                        if !loaded.value.is_object() {
                            warn!("Skipping {:?}: not a {} object", path, resource_type);
                            continue;
                        }
                        let segment = PathSegment::element(&loaded.value, items.len());
                        provenance.extend_prefixed(&base.child(segment), loaded.provenance);
                        items.push(loaded.value);
                    }
                    debug!("Read {} {} files from {:?}", items.len(), resource_type, dir);
                    document.insert(resource_type.to_string(), Value::Array(items));
                }
            }
        }

        Ok(AssembledDocument {
            value: Value::Object(document),
            provenance,
        })
    }

    fn singleton_file(&self, stem: &str) -> Option<PathBuf> {
        DOCUMENT_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", stem, ext)))
            .find(|path| path.is_file())
    }
}

/// Document files directly inside `dir`, sorted by file name.
fn document_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(false, |ext| {
                        DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str())
                    })
        })
        .collect();
    files.sort();
    files
}

//! The load/dump orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use tenant_assets::{
    AssetBundle, AssetError, AssetHandler, AssetShape, CrossReferences, DirectoryReader,
    FileWrite, FileWriteSet, Format, HandlerRegistry, LoadContext, SaveContext,
};
use tenant_document::{DocumentLoader, KeywordEngine, LeafPath, ProvenanceIndex};

use crate::config::ContextConfig;
use crate::error::{ContextError, ContextResult, HandlerFailure};
use crate::lookup::NameLookup;
use crate::masking::SecretMasker;

/// File name of the YAML document when dumping into a directory path.
pub const DEFAULT_YAML_FILE: &str = "tenant.yaml";

/// Outcome of a successful dump.
#[derive(Debug, Clone, Default)]
pub struct DumpReport {
    pub format: Format,
    /// Resource types whose files were written.
    pub succeeded: Vec<String>,
    /// Every file written, absolute.
    pub written: Vec<PathBuf>,
}

/// Drives one run: load a configuration into an asset bundle, and dump a
/// (possibly updated) bundle back to disk.
pub struct Context {
    config: ContextConfig,
    registry: HandlerRegistry,
    loader: DocumentLoader,
    assets: AssetBundle,
    provenance: ProvenanceIndex,
}

impl Context {
    /// Create a context with the standard handler table.
    pub fn new(config: ContextConfig) -> Self {
        Self::with_registry(config, HandlerRegistry::standard())
    }

    /// Create a context over a custom handler table.
    pub fn with_registry(config: ContextConfig, registry: HandlerRegistry) -> Self {
        let engine = KeywordEngine::new(config.keyword_mappings.clone(), config.preserve_keywords);
        Self {
            config,
            registry,
            loader: DocumentLoader::new(engine),
            assets: AssetBundle::new(),
            provenance: ProvenanceIndex::new(),
        }
    }

    /// Seed the context with a bundle and provenance from an earlier load.
    pub fn with_state(mut self, assets: AssetBundle, provenance: ProvenanceIndex) -> Self {
        self.assets = assets;
        self.provenance = provenance;
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn assets(&self) -> &AssetBundle {
        &self.assets
    }

    /// The bundle, for the reconciliation layer to update with observed
    /// remote state before a dump.
    pub fn assets_mut(&mut self) -> &mut AssetBundle {
        &mut self.assets
    }

    /// Templates recorded by the last load, minus those consumed by a dump.
    pub fn provenance(&self) -> &ProvenanceIndex {
        &self.provenance
    }

    /// Handlers taking part in this run, in registry order.
    fn enabled_handlers(&self) -> Vec<Arc<dyn AssetHandler>> {
        self.registry
            .iter()
            .filter(|h| {
                let enabled = self.config.exclusions.includes_type(h.resource_type());
                if !enabled {
                    debug!("Resource type {} is excluded", h.resource_type());
                }
                enabled
            })
            .cloned()
            .collect()
    }

    /// Load the configuration at `input` into the asset bundle.
    ///
    /// A directory is read in directory format, anything else as a YAML
    /// document, unless the configuration names a format.
    pub fn load(&mut self, input: impl AsRef<Path>) -> ContextResult<&AssetBundle> {
        let input = input.as_ref();
        let format = self.config.format.unwrap_or(if input.is_dir() {
            Format::Directory
        } else {
            Format::Yaml
        });
        info!("Loading {} configuration from {:?}", format, input);

        let handlers = self.enabled_handlers();

        let (document, mut provenance, root) = match format {
            Format::Yaml => {
                let loaded = self.loader.load(input)?;
                let root = loaded
                    .path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (loaded.value, loaded.provenance, root)
            }
            Format::Directory => {
                let reader = DirectoryReader::new(input, &self.loader);
                let assembled = reader
                    .assemble(handlers.iter().map(|h| h.as_ref()))
                    .map_err(|e| ContextError::load("directory", e))?;
                (assembled.value, assembled.provenance, input.to_path_buf())
            }
        };

        let mut bundle = AssetBundle::new();
        for handler in &handlers {
            let resource_type = handler.resource_type();
            let mut ctx = LoadContext::new(&self.loader, format, &root, &mut provenance);
            let value = handler
                .load(&document, &mut ctx)
                .map_err(|e| ContextError::load(resource_type, e))?;

            let value = match value {
                Some(value) => self.config.exclusions.filter_instances(handler.as_ref(), value),
                None => Value::Null,
            };
            bundle.insert(resource_type, value);
        }

        info!(
            "Loaded {} resource types ({} templated leaves)",
            bundle.iter().filter(|(_, v)| !v.is_null()).count(),
            provenance.len()
        );
        self.assets = bundle;
        self.provenance = provenance;
        Ok(&self.assets)
    }

    /// Dump the asset bundle to `output`.
    ///
    /// In YAML format `output` is the document path (or a directory that
    /// receives `tenant.yaml`); in directory format it is the root directory.
    pub async fn dump(
        &mut self,
        output: impl AsRef<Path>,
        lookup: &dyn NameLookup,
    ) -> ContextResult<DumpReport> {
        let output = output.as_ref();
        let format = self.config.format.unwrap_or_else(|| infer_output_format(output));
        let (root, document_path) = match format {
            Format::Yaml if is_yaml_path(output) => (
                output
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")),
                Some(output.to_path_buf()),
            ),
            Format::Yaml => (output.to_path_buf(), Some(output.join(DEFAULT_YAML_FILE))),
            Format::Directory => (output.to_path_buf(), None),
        };
        info!("Dumping {} configuration to {:?}", format, output);

        let handlers = self.enabled_handlers();

        // Identifiers are needed for name resolution and may be stripped below.
        let xrefs = self.snapshot_cross_references(&handlers, lookup).await?;
        let bundle = self.prepare_bundle(&handlers);

        let save_ctx = SaveContext {
            format,
            cross_references: &xrefs,
        };
        let mut failures = Vec::new();
        let mut saved: Vec<(String, FileWriteSet)> = Vec::new();
        for handler in &handlers {
            let resource_type = handler.resource_type().to_string();
            match handler.save(&bundle, &save_ctx) {
                Ok(set) => saved.push((resource_type, set)),
                Err(source) => {
                    error!("Failed to save {}: {}", resource_type, source);
                    failures.push(HandlerFailure {
                        resource_type,
                        source,
                    });
                }
            }
        }

        let mut fragments = Map::new();
        let mut writes = Vec::with_capacity(saved.len());
        for (resource_type, FileWriteSet { fragment, files }) in saved {
            if let Some(fragment) = fragment {
                fragments.insert(resource_type.clone(), fragment);
            }
            let root = root.clone();
            writes.push(async move {
                let result = write_files(&root, &files).await;
                (resource_type, result)
            });
        }
        let results = join_all(writes).await;

        let mut report = DumpReport {
            format,
            ..Default::default()
        };
        for (resource_type, result) in results {
            match result {
                Ok(mut written) => {
                    report.written.append(&mut written);
                    report.succeeded.push(resource_type);
                }
                Err(source) => {
                    error!("Failed to write {} files: {}", resource_type, source);
                    fragments.remove(&resource_type);
                    failures.push(HandlerFailure {
                        resource_type,
                        source,
                    });
                }
            }
        }

        // A partial document would silently drop the failed resource types.
        if let Some(document_path) = document_path.filter(|_| failures.is_empty()) {
            let document = serde_yaml::to_string(&Value::Object(fragments.clone()))?;
            if let Err(e) = write_file(&document_path, &document).await {
                error!("Failed to write {:?}: {}", document_path, e);
                report.succeeded.retain(|t| !fragments.contains_key(t));
                for resource_type in fragments.keys() {
                    failures.push(HandlerFailure {
                        resource_type: resource_type.clone(),
                        source: AssetError::Io(std::io::Error::new(e.kind(), e.to_string())),
                    });
                }
            } else {
                report.written.push(document_path);
            }
        }

        if !failures.is_empty() {
            if format == Format::Yaml {
                warn!("Leaving the YAML document untouched after {} failures", failures.len());
                report.succeeded.retain(|t| !fragments.contains_key(t));
            }
            return Err(ContextError::DumpFailed {
                succeeded: report.succeeded,
                failures,
            });
        }

        info!(
            "Dumped {} resource types ({} files)",
            report.succeeded.len(),
            report.written.len()
        );
        Ok(report)
    }

    /// Capture client id to name before identifiers are stripped.
    async fn snapshot_cross_references(
        &self,
        handlers: &[Arc<dyn AssetHandler>],
        lookup: &dyn NameLookup,
    ) -> ContextResult<CrossReferences> {
        let mut xrefs = CrossReferences::new();

        let needed = handlers
            .iter()
            .any(|h| h.uses_client_refs() && self.assets.is_present(h.resource_type()));
        if !needed {
            return Ok(xrefs);
        }

        if self.assets.is_present("clients") {
            for client in self.assets.items("clients") {
                if let (Some(id), Some(name)) = (
                    client.get("client_id").and_then(Value::as_str),
                    client.get("name").and_then(Value::as_str),
                ) {
                    xrefs.insert_client(id, name);
                }
            }
        } else {
            debug!("No clients in bundle, listing client names remotely");
            for client in lookup.list_clients().await? {
                xrefs.insert_client(client.client_id, client.name);
            }
        }

        debug!("Snapshot holds {} client names", xrefs.client_count());
        Ok(xrefs)
    }

    /// Filter, strip identifiers, mask secrets and restore keyword markers.
    fn prepare_bundle(&mut self, handlers: &[Arc<dyn AssetHandler>]) -> AssetBundle {
        let mut bundle = AssetBundle::new();
        for handler in handlers {
            let resource_type = handler.resource_type();
            let Some(value) = self.assets.get(resource_type) else {
                continue;
            };
            let mut value = self
                .config
                .exclusions
                .filter_instances(handler.as_ref(), value.clone());
            if !self.config.export_identifiers {
                strip_identifiers(handler.as_ref(), &mut value);
            }
            bundle.insert(resource_type, value);
        }

        let rules = self.config.mask_rules();
        let masker = SecretMasker::new(&rules);
        if self.config.preserve_keywords {
            // Secrets still produced by their own template are restored below.
            let engine = self.loader.engine();
            let provenance = &self.provenance;
            let templated = |path: &LeafPath, value: &Value| {
                provenance
                    .get(path)
                    .map_or(false, |entry| engine.evaluate(&entry.original_text, entry.mode) == *value)
            };
            masker
                .skip_templated(&templated)
                .apply(&mut bundle, &self.registry);
        } else {
            masker.apply(&mut bundle, &self.registry);
        }

        if self.config.preserve_keywords {
            let engine = self.loader.engine();
            for (resource_type, value) in bundle.iter_mut() {
                let path = LeafPath::root().key(resource_type);
                let current = std::mem::take(value);
                *value = engine.reconcile_tree(&path, current, &mut self.provenance);
            }
        }

        bundle
    }
}

fn strip_identifiers(handler: &dyn AssetHandler, value: &mut Value) {
    let fields = handler.identifier_fields();
    if fields.is_empty() {
        return;
    }
    let strip = |node: &mut Value| {
        if let Value::Object(map) = node {
            for field in fields {
                map.remove(*field);
            }
        }
    };
    match (handler.shape(), value) {
        (AssetShape::Collection, Value::Array(items)) => items.iter_mut().for_each(strip),
        (AssetShape::Singleton, node) => strip(node),
        _ => {}
    }
}

fn is_yaml_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

fn infer_output_format(output: &Path) -> Format {
    if is_yaml_path(output) {
        Format::Yaml
    } else {
        Format::Directory
    }
}

async fn write_file(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await
}

/// Write a handler's files concurrently; all writes complete before returning.
async fn write_files(root: &Path, files: &[FileWrite]) -> Result<Vec<PathBuf>, AssetError> {
    let writes = files.iter().map(|file| {
        let path = root.join(&file.path);
        async move {
            write_file(&path, &file.contents).await?;
            Ok::<PathBuf, std::io::Error>(path)
        }
    });

    let mut written = Vec::with_capacity(files.len());
    let mut first_error = None;
    for result in join_all(writes).await {
        match result {
            Ok(path) => written.push(path),
            Err(e) => {
                warn!("Write failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(AssetError::Io(e)),
        None => Ok(written),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{ClientName, MockNameLookup};
    use serde_json::json;
    use tempfile::tempdir;

    fn grants_context(types: &[&str]) -> Context {
        let exclusions = crate::exclusions::ExclusionRules::new().include_only(types);
        let mut ctx = Context::new(ContextConfig::new().with_exclusions(exclusions));
        ctx.assets_mut().insert(
            "clientGrants",
            json!([{"id": "cg1", "client_id": "abc", "audience": "https://api"}]),
        );
        ctx
    }

    #[tokio::test]
    async fn test_lookup_used_when_clients_absent() {
        let temp = tempdir().unwrap();
        let mut ctx = grants_context(&["clientGrants"]);

        let mut lookup = MockNameLookup::new();
        lookup
            .expect_list_clients()
            .times(1)
            .returning(|| Ok(vec![ClientName::new("abc", "My App")]));

        let report = ctx.dump(temp.path(), &lookup).await.unwrap();
        assert_eq!(report.format, Format::Directory);
        assert_eq!(report.succeeded, vec!["clientGrants".to_string()]);

        let written = std::fs::read_to_string(temp.path().join("client-grants/My App.json")).unwrap();
        let grant: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(grant, json!({"client_id": "My App", "audience": "https://api"}));
    }

    #[tokio::test]
    async fn test_lookup_skipped_when_clients_present() {
        let temp = tempdir().unwrap();
        let mut ctx = grants_context(&["clients", "clientGrants"]);
        ctx.assets_mut().insert(
            "clients",
            json!([{"name": "Local Name", "client_id": "abc"}]),
        );

        let mut lookup = MockNameLookup::new();
        lookup.expect_list_clients().times(0);

        ctx.dump(temp.path().join("tenant.yaml"), &lookup).await.unwrap();
        let document: Value = serde_yaml::from_str(
            &std::fs::read_to_string(temp.path().join("tenant.yaml")).unwrap(),
        )
        .unwrap();
        assert_eq!(document["clientGrants"][0]["client_id"], json!("Local Name"));
        assert!(document["clients"][0].get("client_id").is_none());
    }

    #[tokio::test]
    async fn test_lookup_error_aborts_dump() {
        let temp = tempdir().unwrap();
        let mut ctx = grants_context(&["clientGrants"]);

        let mut lookup = MockNameLookup::new();
        lookup
            .expect_list_clients()
            .returning(|| Err(ContextError::Lookup("rate limited".into())));

        let err = ctx.dump(temp.path(), &lookup).await.unwrap_err();
        assert!(matches!(err, ContextError::Lookup(_)));
        assert!(!temp.path().join("client-grants").exists());
    }

    #[test]
    fn test_infer_output_format() {
        assert_eq!(infer_output_format(Path::new("out/tenant.yml")), Format::Yaml);
        assert_eq!(infer_output_format(Path::new("out/tenant.YAML")), Format::Yaml);
        assert_eq!(infer_output_format(Path::new("out")), Format::Directory);
    }
}

//! Handler implementations for singleton and collection resources.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde_json::{json, Map, Value};
use tracing::debug;

use tenant_document::{LeafPath, PathSegment};

use crate::bundle::AssetBundle;
use crate::error::{AssetError, AssetResult};
use crate::handler::{
    AssetHandler, AssetShape, CrossReferences, FileWrite, FileWriteSet, Format, LoadContext,
    SaveContext,
};

/// A field whose value lives in a separate file next to the resource.
#[derive(Debug, Clone, Copy)]
pub struct CodeFile {
    pub field: &'static str,
    pub extension: &'static str,
}

/// Handler for a list of named resources (clients, rules, ...).
#[derive(Debug, Clone)]
pub struct CollectionHandler {
    resource_type: &'static str,
    directory: &'static str,
    name_field: &'static str,
    identifier_fields: &'static [&'static str],
    code: Option<CodeFile>,
    client_refs: &'static [&'static str],
}

impl CollectionHandler {
    /// A handler for `resource_type` stored under `directory`, named by its
    /// `name` field and carrying an `id` identifier.
    pub fn new(resource_type: &'static str, directory: &'static str) -> Self {
        Self {
            resource_type,
            directory,
            name_field: "name",
            identifier_fields: &["id"],
            code: None,
            client_refs: &[],
        }
    }

    pub fn name_field(mut self, field: &'static str) -> Self {
        self.name_field = field;
        self
    }

    /// Server-assigned fields stripped on dump unless identifiers are exported.
    pub fn identifiers(mut self, fields: &'static [&'static str]) -> Self {
        self.identifier_fields = fields;
        self
    }

    /// `field` holds a code body kept in a side file with `extension`.
    pub fn code(mut self, field: &'static str, extension: &'static str) -> Self {
        self.code = Some(CodeFile { field, extension });
        self
    }

    /// Fields holding a client id (or a list of them) that are written as
    /// client names.
    pub fn client_refs(mut self, fields: &'static [&'static str]) -> Self {
        self.client_refs = fields;
        self
    }

    fn load_code(
        &self,
        item: &mut Value,
        index: usize,
        ctx: &mut LoadContext<'_>,
    ) -> AssetResult<()> {
        let Some(code) = self.code else {
            return Ok(());
        };
        let reference = match item.get(code.field) {
            Some(Value::String(reference)) if is_file_reference(reference, code.extension) => {
                reference.clone()
            }
            _ => return Ok(()),
        };

        let leaf = LeafPath::root()
            .key(self.resource_type)
            .child(PathSegment::element(item, index))
            .key(code.field);
        let body = ctx.read_aux(self.directory, &reference, &leaf)?;
        item[code.field] = Value::String(body);
        Ok(())
    }

    fn resolve_client_refs(&self, item: &mut Value, xrefs: &CrossReferences) {
        for field in self.client_refs {
            match item.get_mut(*field) {
                Some(Value::String(id)) => {
                    let name = xrefs.client_name_or_id(id).to_string();
                    *id = name;
                }
                Some(Value::Array(ids)) => {
                    for id in ids.iter_mut() {
                        if let Value::String(s) = id {
                            let name = xrefs.client_name_or_id(s).to_string();
                            *s = name;
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl AssetHandler for CollectionHandler {
    fn resource_type(&self) -> &str {
        self.resource_type
    }

    fn directory(&self) -> &str {
        self.directory
    }

    fn shape(&self) -> AssetShape {
        AssetShape::Collection
    }

    fn identifier_fields(&self) -> &[&str] {
        self.identifier_fields
    }

    fn instance_name<'v>(&self, item: &'v Value) -> Option<&'v str> {
        item.get(self.name_field).and_then(Value::as_str)
    }

    fn uses_client_refs(&self) -> bool {
        !self.client_refs.is_empty()
    }

    fn load(&self, document: &Value, ctx: &mut LoadContext<'_>) -> AssetResult<Option<Value>> {
        let items = match document.get(self.resource_type) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(AssetError::invalid(
                    self.resource_type,
                    format!("expected a list, found {}", kind(other)),
                ))
            }
        };

        let mut loaded = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let mut item = item.clone();
            self.load_code(&mut item, index, ctx)?;
            loaded.push(item);
        }

        debug!("Loaded {} {}", loaded.len(), self.resource_type);
        Ok(Some(Value::Array(loaded)))
    }

    fn save(&self, bundle: &AssetBundle, ctx: &SaveContext<'_>) -> AssetResult<FileWriteSet> {
        let items = match bundle.get(self.resource_type) {
            None | Some(Value::Null) => return Ok(FileWriteSet::default()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(AssetError::invalid(
                    self.resource_type,
                    format!("expected a list, found {}", kind(other)),
                ))
            }
        };

        let mut set = FileWriteSet::default();
        let mut fragment = Vec::with_capacity(items.len());
        let mut used = BTreeSet::new();

        for item in items {
            let mut item = item.clone();
            self.resolve_client_refs(&mut item, ctx.cross_references);

            let name = self
                .instance_name(&item)
                .map(sanitize_name)
                .unwrap_or_else(|| self.resource_type.to_string());
            let stem = unique_stem(name, &mut used);

            if let Some(code) = self.code {
                if let Some(Value::String(body)) = item.get(code.field).cloned() {
                    let file_name = format!("{}{}", stem, code.extension);
                    let reference = match ctx.format {
                        Format::Yaml => format!("./{}/{}", self.directory, file_name),
                        Format::Directory => format!("./{}", file_name),
                    };
                    set.files
                        .push(FileWrite::new(PathBuf::from(self.directory).join(&file_name), body));
                    item[code.field] = Value::String(reference);
                }
            }

            match ctx.format {
                Format::Yaml => fragment.push(item),
                Format::Directory => {
                    let path = PathBuf::from(self.directory).join(format!("{}.json", stem));
                    set.files.push(FileWrite::new(path, to_json_file(&item)?));
                }
            }
        }

        if ctx.format == Format::Yaml {
            set.fragment = Some(Value::Array(fragment));
        }
        Ok(set)
    }
}

/// Handler for tenant-wide settings.
#[derive(Debug, Clone, Default)]
pub struct TenantHandler;

impl TenantHandler {
    pub const RESOURCE_TYPE: &'static str = "tenant";

    /// Session durations are authored in hours; the tenant API takes minutes.
    pub const SESSION_FIELDS: &'static [&'static str] = &["session_lifetime", "idle_session_lifetime"];
}

impl AssetHandler for TenantHandler {
    fn resource_type(&self) -> &str {
        Self::RESOURCE_TYPE
    }

    fn directory(&self) -> &str {
        Self::RESOURCE_TYPE
    }

    fn shape(&self) -> AssetShape {
        AssetShape::Singleton
    }

    fn identifier_fields(&self) -> &[&str] {
        &[]
    }

    fn load(&self, document: &Value, _ctx: &mut LoadContext<'_>) -> AssetResult<Option<Value>> {
        let tenant = match document.get(Self::RESOURCE_TYPE) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(tenant)) => tenant,
            Some(other) => {
                return Err(AssetError::invalid(
                    Self::RESOURCE_TYPE,
                    format!("expected an object, found {}", kind(other)),
                ))
            }
        };

        let mut tenant = tenant.clone();
        session_durations_to_minutes(&mut tenant);
        Ok(Some(Value::Object(tenant)))
    }

    fn save(&self, bundle: &AssetBundle, ctx: &SaveContext<'_>) -> AssetResult<FileWriteSet> {
        let tenant = match bundle.get(Self::RESOURCE_TYPE) {
            None | Some(Value::Null) => return Ok(FileWriteSet::default()),
            Some(tenant @ Value::Object(_)) => tenant.clone(),
            Some(other) => {
                return Err(AssetError::invalid(
                    Self::RESOURCE_TYPE,
                    format!("expected an object, found {}", kind(other)),
                ))
            }
        };

        let mut set = FileWriteSet::default();
        match ctx.format {
            Format::Yaml => set.fragment = Some(tenant),
            Format::Directory => set.files.push(FileWrite::new(
                format!("{}.json", Self::RESOURCE_TYPE),
                to_json_file(&tenant)?,
            )),
        }
        Ok(set)
    }
}

/// Replace numeric hour durations with `<field>_in_minutes`.
fn session_durations_to_minutes(tenant: &mut Map<String, Value>) {
    for field in TenantHandler::SESSION_FIELDS {
        let Some(hours) = tenant.get(*field).and_then(Value::as_f64) else {
            continue;
        };
        tenant.remove(*field);
        let minutes = (hours * 60.0).round() as i64;
        tenant.insert(format!("{}_in_minutes", field), json!(minutes));
    }
}

fn is_file_reference(value: &str, extension: &str) -> bool {
    !value.contains('\n') && value.trim().ends_with(extension)
}

/// Make a resource name safe to use as a file stem.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').to_string();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

fn unique_stem(stem: String, used: &mut BTreeSet<String>) -> String {
    if used.insert(stem.clone()) {
        return stem;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}-{}", stem, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn to_json_file(value: &Value) -> AssetResult<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

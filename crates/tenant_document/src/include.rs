//! `!include` directive resolution.
//!
//! A YAML node tagged `!include <relative-path>` is replaced by the parsed
//! content of the referenced file, resolved relative to the directory of the
//! file containing the directive. Resolution threads an explicit stack of the
//! files on the current recursion path: a file may be reached twice through
//! unrelated branches, but revisiting a file on its own ancestor chain is a
//! cycle.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Number, Value};
use serde_yaml::value::TaggedValue;
use tracing::debug;

use crate::error::{DocumentError, DocumentResult};

/// Tag name of the include directive (without the leading `!`).
pub const INCLUDE_TAG: &str = "include";

/// Files spliced into a resolved tree, keyed by the JSON pointer of the
/// directive each one replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeOrigins {
    sites: Vec<(String, PathBuf)>,
}

impl IncludeOrigins {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, pointer: &str, file: &Path) {
        self.sites.push((pointer.to_string(), file.to_path_buf()));
    }

    /// File that contributed the node at `pointer`: the innermost include
    /// covering it, or `top_level` when no include does.
    pub fn file_for<'a>(&'a self, pointer: &str, top_level: &'a Path) -> &'a Path {
        self.sites
            .iter()
            .filter(|(site, _)| {
                pointer == site
                    || (pointer.starts_with(site.as_str())
                        && pointer[site.len()..].starts_with('/'))
            })
            .max_by_key(|(site, _)| site.len())
            .map_or(top_level, |(_, file)| file.as_path())
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Append `token` to a JSON pointer, escaping it.
pub fn pointer_child(parent: &str, token: &str) -> String {
    format!("{}/{}", parent, token.replace('~', "~0").replace('/', "~1"))
}

/// Resolver for include directives.
pub struct IncludeResolver;

impl IncludeResolver {
    /// Resolve a top-level file, starting a fresh resolution stack.
    pub fn resolve_file(path: impl AsRef<Path>) -> DocumentResult<Value> {
        Self::resolve_file_with_origins(path).map(|(value, _)| value)
    }

    /// Resolve a top-level file and report where each included file landed.
    pub fn resolve_file_with_origins(
        path: impl AsRef<Path>,
    ) -> DocumentResult<(Value, IncludeOrigins)> {
        let path = absolutize(path.as_ref())?;
        let stack = vec![path.clone()];
        let mut origins = IncludeOrigins::new();
        let value = Self::resolve(&path, &stack, "", &mut origins)?;
        Ok((value, origins))
    }

    /// Resolve `path` whose ancestor chain (including `path` itself) is
    /// `stack`, placing its content at `pointer`.
    fn resolve(
        path: &Path,
        stack: &[PathBuf],
        pointer: &str,
        origins: &mut IncludeOrigins,
    ) -> DocumentResult<Value> {
        debug!("Resolving document {:?} (depth {})", path, stack.len());

        let content = fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if is_json(path) {
            let value: Value = serde_json::from_str(&content)?;
            return Ok(value);
        }

        let raw: serde_yaml::Value = serde_yaml::from_str(&content)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut expander = Expander {
            path,
            base_dir,
            stack,
            origins,
        };
        expander.expand(raw, pointer)
    }
}

/// Converts the YAML nodes of one file, expanding its include directives.
struct Expander<'a> {
    path: &'a Path,
    base_dir: &'a Path,
    stack: &'a [PathBuf],
    origins: &'a mut IncludeOrigins,
}

impl Expander<'_> {
    /// Convert a YAML node to JSON, expanding include directives depth-first.
    fn expand(&mut self, node: serde_yaml::Value, pointer: &str) -> DocumentResult<Value> {
        use serde_yaml::Value as Yaml;

        match node {
            Yaml::Null => Ok(Value::Null),
            Yaml::Bool(b) => Ok(Value::Bool(b)),
            Yaml::Number(n) => convert_number(&n, self.path),
            Yaml::String(s) => Ok(Value::String(s)),
            Yaml::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let child = pointer_child(pointer, &index.to_string());
                    out.push(self.expand(item, &child)?);
                }
                Ok(Value::Array(out))
            }
            Yaml::Mapping(mapping) => {
                let mut out = Map::new();
                for (key, value) in mapping {
                    let key = mapping_key(key, self.path)?;
                    let child = pointer_child(pointer, &key);
                    let value = self.expand(value, &child)?;
                    out.insert(key, value);
                }
                Ok(Value::Object(out))
            }
            Yaml::Tagged(tagged) => {
                let TaggedValue { tag, value } = *tagged;
                if tag == INCLUDE_TAG {
                    self.include(value, pointer)
                } else {
                    self.expand(value, pointer)
                }
            }
        }
    }

    fn include(&mut self, target: serde_yaml::Value, pointer: &str) -> DocumentResult<Value> {
        let target = match target {
            serde_yaml::Value::String(s) => s,
            other => {
                return Err(DocumentError::InvalidDocument {
                    path: self.path.to_path_buf(),
                    message: format!("!include expects a file path, found {:?}", other),
                })
            }
        };

        let abs_target = normalize(&self.base_dir.join(target.trim()));
        if !abs_target.is_file() {
            return Err(DocumentError::IncludeNotFound {
                path: abs_target,
                included_from: self.path.to_path_buf(),
            });
        }

        if self.stack.contains(&abs_target) {
            let mut chain = self.stack.to_vec();
            chain.push(abs_target);
            return Err(DocumentError::CircularInclude { chain });
        }

        debug!("Including {:?} from {:?}", abs_target, self.path);
        self.origins.record(pointer, &abs_target);
        let mut child_stack = self.stack.to_vec();
        child_stack.push(abs_target.clone());
        IncludeResolver::resolve(&abs_target, &child_stack, pointer, self.origins)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

fn convert_number(n: &serde_yaml::Number, path: &Path) -> DocumentResult<Value> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::Number(i.into()));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Value::Number(u.into()));
    }
    n.as_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| DocumentError::InvalidDocument {
            path: path.to_path_buf(),
            message: format!("number {} cannot be represented in JSON", n),
        })
}

fn mapping_key(key: serde_yaml::Value, path: &Path) -> DocumentResult<String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => Err(DocumentError::InvalidDocument {
            path: path.to_path_buf(),
            message: format!("unsupported mapping key {:?}", other),
        }),
    }
}

/// Make a path absolute against the current directory and normalize it.
pub fn absolutize(path: &Path) -> DocumentResult<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Fold `.` and `..` components without touching the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

//! Run configuration.
//!
//! Loaded from a JSON, YAML or TOML file (by extension), then overridden by
//! `TENANTKIT_*` environment variables:
//!
//! - `TENANTKIT_FORMAT`: `yaml` or `directory`
//! - `TENANTKIT_PRESERVE_KEYWORDS`, `TENANTKIT_EXPORT_IDENTIFIERS`: booleans
//!   (`true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`)
//! - `TENANTKIT_KEYWORD_MAPPINGS`: a JSON object merged over the file's
//!   mappings
//!
//! Invalid override values are ignored.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use tenant_assets::Format;
use tenant_document::KeywordMappings;

use crate::error::{ContextError, ContextResult};
use crate::exclusions::ExclusionRules;
use crate::masking::MaskRule;

/// Configuration of a load/dump run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// On-disk layout; inferred from the path when unset.
    pub format: Option<Format>,
    /// Values for `@@NAME@@` / `##NAME##` markers.
    pub keyword_mappings: KeywordMappings,
    /// Keep unresolved markers on load and restore markers on dump.
    pub preserve_keywords: bool,
    /// Keep remote identifier fields on dump.
    pub export_identifiers: bool,
    /// Resource type and instance filtering.
    #[serde(flatten)]
    pub exclusions: ExclusionRules,
    /// Mask rules applied in addition to the built-in ones.
    pub secret_masks: Vec<MaskRule>,
}

impl ContextConfig {
    /// Defaults: inferred format, no keywords, no preservation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> ContextResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a configuration file by its extension.
    pub fn from_file(path: impl AsRef<Path>) -> ContextResult<Self> {
        let path = path.as_ref();
        debug!("Reading configuration from {:?}", path);

        let content = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let config = match extension.as_str() {
            "json" => serde_json::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            other => {
                return Err(ContextError::InvalidConfig {
                    path: path.to_path_buf(),
                    message: format!("unsupported extension '{}'", other),
                })
            }
        };
        Ok(config)
    }

    /// Force the on-disk format instead of inferring it from the path.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Add or replace one keyword mapping.
    pub fn with_keyword(mut self, name: impl Into<String>, value: Value) -> Self {
        self.keyword_mappings.insert(name.into(), value);
        self
    }

    pub fn with_keywords(mut self, mappings: KeywordMappings) -> Self {
        self.keyword_mappings.extend(mappings);
        self
    }

    /// Keep unresolved markers on load and restore templates on dump.
    pub fn preserve_keywords(mut self, preserve: bool) -> Self {
        self.preserve_keywords = preserve;
        self
    }

    /// Write server-assigned identifiers on dump.
    pub fn export_identifiers(mut self, export: bool) -> Self {
        self.export_identifiers = export;
        self
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionRules) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Add a mask rule on top of the built-in ones.
    pub fn with_mask(mut self, rule: MaskRule) -> Self {
        self.secret_masks.push(rule);
        self
    }

    /// Built-in mask rules followed by the configured ones.
    pub fn mask_rules(&self) -> Vec<MaskRule> {
        let mut rules = MaskRule::defaults();
        rules.extend(self.secret_masks.iter().cloned());
        rules
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("TENANTKIT_FORMAT") {
            match v.parse::<Format>() {
                Ok(format) => self.format = Some(format),
                Err(e) => warn!("Ignoring TENANTKIT_FORMAT: {}", e),
            }
        }
        if let Some(v) = var("TENANTKIT_PRESERVE_KEYWORDS").and_then(|v| parse_bool(&v)) {
            self.preserve_keywords = v;
        }
        if let Some(v) = var("TENANTKIT_EXPORT_IDENTIFIERS").and_then(|v| parse_bool(&v)) {
            self.export_identifiers = v;
        }
        if let Some(v) = var("TENANTKIT_KEYWORD_MAPPINGS") {
            match serde_json::from_str::<KeywordMappings>(&v) {
                Ok(mappings) => self.keyword_mappings.extend(mappings),
                Err(e) => warn!("Ignoring TENANTKIT_KEYWORD_MAPPINGS: {}", e),
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_from_json_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "format": "directory",
                "keyword_mappings": {"ENV": "prod", "LANGS": ["en"]},
                "preserve_keywords": true,
                "excluded_clients": ["Legacy"],
                "secret_masks": [{"resource_type": "tenant", "field": "smtp.password"}]
            }"#,
        )
        .unwrap();

        let config = ContextConfig::from_file(&path).unwrap();
        assert_eq!(config.format, Some(Format::Directory));
        assert_eq!(config.keyword_mappings["LANGS"], json!(["en"]));
        assert!(config.preserve_keywords);
        assert!(!config.export_identifiers);
        assert!(config.exclusions.is_instance_excluded("clients", "Legacy"));
        assert_eq!(config.mask_rules().len(), MaskRule::defaults().len() + 1);
    }

    #[test]
    fn test_from_toml_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "preserve_keywords = true\nexcluded = [\"rules\"]\n\n[keyword_mappings]\nSESSION = 1.5\nENABLED = true\n",
        )
        .unwrap();

        let config = ContextConfig::from_file(&path).unwrap();
        assert_eq!(config.keyword_mappings["SESSION"], json!(1.5));
        assert_eq!(config.keyword_mappings["ENABLED"], json!(true));
        assert!(!config.exclusions.includes_type("rules"));
    }

    #[test]
    fn test_unsupported_extension() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            ContextConfig::from_file(&path),
            Err(ContextError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TENANTKIT_FORMAT", "yaml"),
            ("TENANTKIT_PRESERVE_KEYWORDS", "on"),
            ("TENANTKIT_EXPORT_IDENTIFIERS", "maybe"),
            ("TENANTKIT_KEYWORD_MAPPINGS", r#"{"ENV": "staging"}"#),
        ]
        .into_iter()
        .collect();

        let mut config = ContextConfig::new()
            .with_keyword("ENV", json!("prod"))
            .with_keyword("OTHER", json!(1))
            .export_identifiers(true);
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.format, Some(Format::Yaml));
        assert!(config.preserve_keywords);
        assert!(config.export_identifiers);
        assert_eq!(config.keyword_mappings["ENV"], json!("staging"));
        assert_eq!(config.keyword_mappings["OTHER"], json!(1));
    }
}

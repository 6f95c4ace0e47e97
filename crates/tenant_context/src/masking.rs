//! Secret masking for dump.
//!
//! A masked field is replaced by a `##NAME##` placeholder so secrets are
//! never written to disk. On the next load the placeholder resolves from the
//! keyword mapping like any other marker.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use tenant_assets::{AssetBundle, HandlerRegistry};
use tenant_document::{LeafPath, PathSegment};

/// Restricts a mask rule to resources whose `field` has one of `one_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtypeMatch {
    pub field: String,
    pub one_of: Vec<String>,
}

/// A sensitive field of a resource type.
///
/// `field` is a dot-separated path; a segment ending in `[]` walks every
/// element of an array (`secrets[].value`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskRule {
    pub resource_type: String,
    pub field: String,
    #[serde(default)]
    pub when: Option<SubtypeMatch>,
}

impl MaskRule {
    pub fn new(resource_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            field: field.into(),
            when: None,
        }
    }

    /// Only mask resources whose `field` is one of `one_of`.
    pub fn when(mut self, field: impl Into<String>, one_of: &[&str]) -> Self {
        self.when = Some(SubtypeMatch {
            field: field.into(),
            one_of: one_of.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// The built-in rules.
    pub fn defaults() -> Vec<MaskRule> {
        vec![
            MaskRule::new("clients", "client_secret"),
            MaskRule::new("connections", "options.client_secret").when(
                "strategy",
                &[
                    "oauth1",
                    "oauth2",
                    "oidc",
                    "okta",
                    "samlp",
                    "waad",
                    "adfs",
                    "google-oauth2",
                    "github",
                    "facebook",
                    "linkedin",
                    "windowslive",
                    "apple",
                ],
            ),
            MaskRule::new("databases", "options.configuration"),
            MaskRule::new("actions", "secrets[].value"),
        ]
    }

    fn applies_to(&self, resource: &Value) -> bool {
        match &self.when {
            None => true,
            Some(subtype) => resource
                .get(&subtype.field)
                .and_then(Value::as_str)
                .map_or(false, |v| subtype.one_of.iter().any(|s| s == v)),
        }
    }
}

/// Predicate telling the masker a leaf still carries the user's own keyword
/// template and must be left for reconciliation.
pub type TemplatedLeaf<'a> = &'a dyn Fn(&LeafPath, &Value) -> bool;

/// Applies mask rules to a bundle.
pub struct SecretMasker<'a> {
    rules: &'a [MaskRule],
    templated: Option<TemplatedLeaf<'a>>,
}

impl<'a> SecretMasker<'a> {
    pub fn new(rules: &'a [MaskRule]) -> Self {
        Self {
            rules,
            templated: None,
        }
    }

    /// Leave leaves matching `templated` untouched.
    pub fn skip_templated(mut self, templated: TemplatedLeaf<'a>) -> Self {
        self.templated = Some(templated);
        self
    }

    /// Mask every matching field in `bundle`. Returns the number of fields
    /// masked.
    pub fn apply(&self, bundle: &mut AssetBundle, registry: &HandlerRegistry) -> usize {
        let mut masked = 0;
        for rule in self.rules {
            let handler = registry.get(&rule.resource_type);
            let Some(value) = bundle.get_mut(&rule.resource_type) else {
                continue;
            };

            match value {
                Value::Array(items) => {
                    for (index, item) in items.iter_mut().enumerate() {
                        if !rule.applies_to(item) {
                            continue;
                        }
                        let instance = handler
                            .as_ref()
                            .and_then(|h| h.instance_name(item))
                            .map(str::to_string)
                            .unwrap_or_else(|| index.to_string());
                        let path = LeafPath::root()
                            .key(rule.resource_type.as_str())
                            .child(PathSegment::element(item, index));
                        let prefix = vec![rule.resource_type.clone(), instance];
                        masked += self.mask_path(item, &split_path(&rule.field), prefix, path);
                    }
                }
                Value::Object(_) => {
                    if rule.applies_to(value) {
                        let path = LeafPath::root().key(rule.resource_type.as_str());
                        let prefix = vec![rule.resource_type.clone()];
                        masked += self.mask_path(value, &split_path(&rule.field), prefix, path);
                    }
                }
                _ => {}
            }
        }

        if masked > 0 {
            debug!("Masked {} secret fields", masked);
        }
        masked
    }

    fn mask_path(&self, node: &mut Value, path: &[&str], mut name: Vec<String>, leaf: LeafPath) -> usize {
        let Some((head, rest)) = path.split_first() else {
            return 0;
        };

        if let Some(field) = head.strip_suffix("[]") {
            name.push(field.to_string());
            let Some(Value::Array(items)) = node.get_mut(field) else {
                return 0;
            };
            let mut masked = 0;
            for (index, item) in items.iter_mut().enumerate() {
                let element = item
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| index.to_string());
                let mut element_name = name.clone();
                element_name.push(element);
                let element_leaf = leaf.key(field).child(PathSegment::element(item, index));
                masked += self.mask_path(item, rest, element_name, element_leaf);
            }
            return masked;
        }

        name.push(head.to_string());
        let leaf = leaf.key(*head);
        let Some(child) = node.get_mut(*head) else {
            return 0;
        };
        if !rest.is_empty() {
            return self.mask_path(child, rest, name, leaf);
        }
        if child.is_null() {
            return 0;
        }
        if self.templated.map_or(false, |templated| templated(&leaf, child)) {
            debug!("Keeping keyword template for secret at {}", leaf);
            return 0;
        }
        *child = Value::String(placeholder(&name));
        1
    }
}

fn split_path(field: &str) -> Vec<&str> {
    field.split('.').filter(|s| !s.is_empty()).collect()
}

/// Build a `##NAME##` placeholder from name parts.
pub fn placeholder(parts: &[String]) -> String {
    let mut name = String::new();
    for c in parts.join("_").chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_uppercase());
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_matches('_');
    format!("##{}##", if name.is_empty() { "SECRET" } else { name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholder() {
        assert_eq!(
            placeholder(&["clients".into(), "My App".into(), "client_secret".into()]),
            "##CLIENTS_MY_APP_CLIENT_SECRET##"
        );
        assert_eq!(placeholder(&["--".into()]), "##SECRET##");
    }

    #[test]
    fn test_mask_defaults() {
        let registry = HandlerRegistry::standard();
        let mut bundle = AssetBundle::new();
        bundle.insert(
            "clients",
            json!([{"name": "My App", "client_secret": "s3cr3t"}, {"name": "Public"}]),
        );
        bundle.insert(
            "connections",
            json!([
                {"name": "google", "strategy": "google-oauth2", "options": {"client_secret": "g"}},
                {"name": "email", "strategy": "email", "options": {"client_secret": "e"}}
            ]),
        );
        bundle.insert(
            "actions",
            json!([{"name": "notify", "secrets": [{"name": "API_KEY", "value": "k"}]}]),
        );

        let rules = MaskRule::defaults();
        let masked = SecretMasker::new(&rules).apply(&mut bundle, &registry);
        assert_eq!(masked, 3);

        assert_eq!(
            bundle.items("clients")[0]["client_secret"],
            json!("##CLIENTS_MY_APP_CLIENT_SECRET##")
        );
        assert!(bundle.items("clients")[1].get("client_secret").is_none());
        assert_eq!(
            bundle.items("connections")[0]["options"]["client_secret"],
            json!("##CONNECTIONS_GOOGLE_OPTIONS_CLIENT_SECRET##")
        );
        assert_eq!(bundle.items("connections")[1]["options"]["client_secret"], json!("e"));
        assert_eq!(
            bundle.items("actions")[0]["secrets"][0]["value"],
            json!("##ACTIONS_NOTIFY_SECRETS_API_KEY_VALUE##")
        );
    }

    #[test]
    fn test_mask_singleton() {
        let registry = HandlerRegistry::standard();
        let mut bundle = AssetBundle::new();
        bundle.insert("tenant", json!({"smtp": {"password": "p"}}));

        let rules = vec![MaskRule::new("tenant", "smtp.password")];
        assert_eq!(SecretMasker::new(&rules).apply(&mut bundle, &registry), 1);
        assert_eq!(
            bundle.get("tenant").unwrap()["smtp"]["password"],
            json!("##TENANT_SMTP_PASSWORD##")
        );
    }

    #[test]
    fn test_mask_skips_templated_leaves() {
        let registry = HandlerRegistry::standard();
        let mut bundle = AssetBundle::new();
        bundle.insert(
            "clients",
            json!([
                {"name": "My App", "client_secret": "from-env"},
                {"name": "Other", "client_secret": "typed-in"}
            ]),
        );

        let templated_path = LeafPath::root()
            .key("clients")
            .child(PathSegment::Item {
                field: "name".into(),
                value: "My App".into(),
            })
            .key("client_secret");
        let templated = |path: &LeafPath, _: &Value| *path == templated_path;

        let rules = MaskRule::defaults();
        let masked = SecretMasker::new(&rules)
            .skip_templated(&templated)
            .apply(&mut bundle, &registry);
        assert_eq!(masked, 1);
        assert_eq!(bundle.items("clients")[0]["client_secret"], json!("from-env"));
        assert_eq!(
            bundle.items("clients")[1]["client_secret"],
            json!("##CLIENTS_OTHER_CLIENT_SECRET##")
        );
    }
}

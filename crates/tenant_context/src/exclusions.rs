//! Inclusion and exclusion rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use tenant_assets::{AssetHandler, AssetShape};

/// Which resource types and named instances take part in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionRules {
    /// When set, only these resource types are processed.
    pub included_only: Option<Vec<String>>,
    /// Resource types that are never processed.
    pub excluded: Vec<String>,
    /// Rule names to skip.
    pub excluded_rules: Vec<String>,
    /// Client names to skip.
    pub excluded_clients: Vec<String>,
    /// Database connection names to skip.
    pub excluded_databases: Vec<String>,
    /// Connection names to skip.
    pub excluded_connections: Vec<String>,
    /// Resource server names to skip.
    pub excluded_resource_servers: Vec<String>,
}

impl ExclusionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the run to `types`.
    pub fn include_only(mut self, types: &[&str]) -> Self {
        self.included_only = Some(types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn exclude_type(mut self, resource_type: impl Into<String>) -> Self {
        self.excluded.push(resource_type.into());
        self
    }

    /// Exclude a named instance. Types without an instance denylist are
    /// ignored.
    pub fn exclude_instance(mut self, resource_type: &str, name: impl Into<String>) -> Self {
        if let Some(list) = self.instance_list_mut(resource_type) {
            list.push(name.into());
        }
        self
    }

    /// Whether `resource_type` takes part in the run.
    pub fn includes_type(&self, resource_type: &str) -> bool {
        if let Some(only) = &self.included_only {
            if !only.iter().any(|t| t == resource_type) {
                return false;
            }
        }
        !self.excluded.iter().any(|t| t == resource_type)
    }

    /// Instance names excluded for `resource_type`.
    pub fn excluded_names(&self, resource_type: &str) -> &[String] {
        match resource_type {
            "rules" => self.excluded_rules.as_slice(),
            "clients" => self.excluded_clients.as_slice(),
            "databases" => self.excluded_databases.as_slice(),
            "connections" => self.excluded_connections.as_slice(),
            "resourceServers" => self.excluded_resource_servers.as_slice(),
            _ => &[],
        }
    }

    fn instance_list_mut(&mut self, resource_type: &str) -> Option<&mut Vec<String>> {
        match resource_type {
            "rules" => Some(&mut self.excluded_rules),
            "clients" => Some(&mut self.excluded_clients),
            "databases" => Some(&mut self.excluded_databases),
            "connections" => Some(&mut self.excluded_connections),
            "resourceServers" => Some(&mut self.excluded_resource_servers),
            _ => None,
        }
    }

    pub fn is_instance_excluded(&self, resource_type: &str, name: &str) -> bool {
        self.excluded_names(resource_type).iter().any(|n| n == name)
    }

    /// Drop excluded instances from a collection value.
    pub fn filter_instances(&self, handler: &dyn AssetHandler, value: Value) -> Value {
        let resource_type = handler.resource_type();
        if handler.shape() != AssetShape::Collection || self.excluded_names(resource_type).is_empty() {
            return value;
        }

        match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .filter(|item| match handler.instance_name(item) {
                        Some(name) if self.is_instance_excluded(resource_type, name) => {
                            warn!("Skipping excluded {} '{}'", resource_type, name);
                            false
                        }
                        _ => true,
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tenant_assets::{CollectionHandler, TenantHandler};

    #[test]
    fn test_includes_type() {
        let rules = ExclusionRules::new();
        assert!(rules.includes_type("clients"));

        let rules = ExclusionRules::new()
            .include_only(&["clients", "rules"])
            .exclude_type("rules");
        assert!(rules.includes_type("clients"));
        assert!(!rules.includes_type("rules"));
        assert!(!rules.includes_type("tenant"));
    }

    #[test]
    fn test_filter_instances() {
        let rules = ExclusionRules::new().exclude_instance("clients", "Legacy");
        let handler = CollectionHandler::new("clients", "clients");
        let filtered = rules.filter_instances(
            &handler,
            json!([{"name": "Legacy"}, {"name": "Current"}, {"other": 1}]),
        );
        assert_eq!(filtered, json!([{"name": "Current"}, {"other": 1}]));
    }

    #[test]
    fn test_filter_ignores_singletons_and_unlisted_types() {
        let rules = ExclusionRules::new()
            .exclude_instance("tenant", "x")
            .exclude_instance("clients", "x");
        assert!(rules.excluded_names("tenant").is_empty());

        let tenant = json!({"name": "x"});
        assert_eq!(rules.filter_instances(&TenantHandler, tenant.clone()), tenant);

        let roles = CollectionHandler::new("roles", "roles");
        let value = json!([{"name": "x"}]);
        assert_eq!(rules.filter_instances(&roles, value.clone()), value);
    }

    #[test]
    fn test_deserialize_partial() {
        let rules: ExclusionRules =
            serde_json::from_value(json!({"excluded_rules": ["a"], "excluded": ["hooks"]})).unwrap();
        assert!(rules.is_instance_excluded("rules", "a"));
        assert!(!rules.includes_type("hooks"));
        assert!(rules.included_only.is_none());
    }
}

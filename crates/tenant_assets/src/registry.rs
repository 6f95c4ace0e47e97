//! Handler registry: the fixed table of resource-type handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{AssetError, AssetResult};
use crate::handler::AssetHandler;
use crate::handlers::{CollectionHandler, TenantHandler};

/// A registry of asset handlers keyed by resource type.
///
/// Iteration is ordered by resource type name; handlers carry no ordering
/// dependencies between each other.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<dyn AssetHandler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// The standard handler table.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TenantHandler));
        registry.register(Arc::new(
            CollectionHandler::new("clients", "clients").identifiers(&["id", "client_id"]),
        ));
        registry.register(Arc::new(
            CollectionHandler::new("connections", "connections").client_refs(&["enabled_clients"]),
        ));
        registry.register(Arc::new(
            CollectionHandler::new("databases", "databases").client_refs(&["enabled_clients"]),
        ));
        registry.register(Arc::new(CollectionHandler::new(
            "resourceServers",
            "resource-servers",
        )));
        registry.register(Arc::new(
            CollectionHandler::new("rules", "rules").code("script", ".js"),
        ));
        registry.register(Arc::new(
            CollectionHandler::new("actions", "actions").code("code", ".js"),
        ));
        registry.register(Arc::new(
            CollectionHandler::new("clientGrants", "client-grants")
                .name_field("client_id")
                .client_refs(&["client_id"]),
        ));
        registry.register(Arc::new(CollectionHandler::new("roles", "roles")));
        registry
    }

    /// Register a handler under its resource type, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn AssetHandler>) {
        let name = handler.resource_type().to_string();
        debug!("Registering handler: {}", name);
        self.handlers.insert(name, handler);
    }

    /// Get a handler by resource type.
    pub fn get(&self, resource_type: &str) -> Option<Arc<dyn AssetHandler>> {
        self.handlers.get(resource_type).cloned()
    }

    /// Get a handler by resource type, returning an error if not found.
    pub fn get_required(&self, resource_type: &str) -> AssetResult<Arc<dyn AssetHandler>> {
        self.get(resource_type)
            .ok_or_else(|| AssetError::HandlerNotFound(resource_type.to_string()))
    }

    /// Registered resource types, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }

    /// Handlers in resource type order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AssetHandler>> {
        self.handlers.values()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::AssetShape;

    #[test]
    fn test_standard_table() {
        let registry = HandlerRegistry::standard();
        assert_eq!(
            registry.names(),
            vec![
                "actions",
                "clientGrants",
                "clients",
                "connections",
                "databases",
                "resourceServers",
                "roles",
                "rules",
                "tenant"
            ]
        );
        assert_eq!(registry.get("tenant").unwrap().shape(), AssetShape::Singleton);
        assert_eq!(
            registry.get("clients").unwrap().identifier_fields(),
            &["id", "client_id"]
        );
    }

    #[test]
    fn test_get_required_missing() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        let err = registry.get_required("hooks").err().unwrap();
        assert_eq!(err.to_string(), "Handler not found: hooks");
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(CollectionHandler::new("roles", "roles")));
        registry.register(Arc::new(CollectionHandler::new("roles", "role-files")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("roles").unwrap().directory(), "role-files");
    }
}

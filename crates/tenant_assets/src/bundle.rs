//! The asset bundle: resource-type name to parsed representation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized configuration keyed by resource type.
///
/// A resource type that was looked for but is absent on disk maps to
/// `Value::Null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetBundle {
    assets: BTreeMap<String, Value>,
}

impl AssetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the representation of a resource type, returning the previous one.
    pub fn insert(&mut self, resource_type: impl Into<String>, value: Value) -> Option<Value> {
        self.assets.insert(resource_type.into(), value)
    }

    /// Representation of a resource type; `Some(Null)` when absent on disk.
    pub fn get(&self, resource_type: &str) -> Option<&Value> {
        self.assets.get(resource_type)
    }

    pub fn get_mut(&mut self, resource_type: &str) -> Option<&mut Value> {
        self.assets.get_mut(resource_type)
    }

    /// Entries of a collection resource; empty when absent or not an array.
    pub fn items(&self, resource_type: &str) -> &[Value] {
        match self.assets.get(resource_type) {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// Whether the resource type has a non-null value.
    pub fn is_present(&self, resource_type: &str) -> bool {
        self.assets
            .get(resource_type)
            .map_or(false, |value| !value.is_null())
    }

    /// Whether the resource type was looked for, even if it came back null.
    pub fn contains(&self, resource_type: &str) -> bool {
        self.assets.contains_key(resource_type)
    }

    /// Entries in resource type order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.assets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.assets.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// The bundle as a single JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.assets.clone().into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for AssetBundle {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            assets: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_items_and_presence() {
        let mut bundle = AssetBundle::new();
        bundle.insert("clients", json!([{"name": "a"}, {"name": "b"}]));
        bundle.insert("rules", Value::Null);

        assert_eq!(bundle.items("clients").len(), 2);
        assert!(bundle.items("rules").is_empty());
        assert!(bundle.contains("rules"));
        assert!(!bundle.is_present("rules"));
        assert!(bundle.is_present("clients"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let bundle: AssetBundle = vec![("tenant".to_string(), json!({"friendly_name": "t"}))]
            .into_iter()
            .collect();
        assert_eq!(
            serde_json::to_value(&bundle).unwrap(),
            json!({"tenant": {"friendly_name": "t"}})
        );
        assert_eq!(bundle.to_value(), json!({"tenant": {"friendly_name": "t"}}));
    }
}

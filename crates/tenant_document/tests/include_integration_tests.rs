//! Integration tests for include resolution.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use tempfile::tempdir;

use tenant_document::{DocumentError, IncludeResolver};

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn chain_names(err: &DocumentError) -> Vec<String> {
    match err {
        DocumentError::CircularInclude { chain } => chain
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect(),
        other => panic!("expected circular include, got {:?}", other),
    }
}

fn contains_directive_text(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains("!include"),
        Value::Array(items) => items.iter().any(contains_directive_text),
        Value::Object(map) => map.values().any(contains_directive_text),
        _ => false,
    }
}

#[test]
fn test_nested_acyclic_includes() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "tenant.yaml", "rules: !include rules/all.yaml\ntenant:\n  name: t\n");
    write(
        root,
        "rules/all.yaml",
        "- !include one.yaml\n- !include ../shared/two.yaml\n",
    );
    write(root, "rules/one.yaml", "name: one\n");
    write(root, "shared/two.yaml", "name: two\nextra: !include ../rules/leaf.json\n");
    write(root, "rules/leaf.json", r#"{"leaf": true}"#);

    let value = IncludeResolver::resolve_file(root.join("tenant.yaml")).unwrap();
    assert_eq!(
        value,
        json!({
            "rules": [
                {"name": "one"},
                {"name": "two", "extra": {"leaf": true}}
            ],
            "tenant": {"name": "t"}
        })
    );
    assert!(!contains_directive_text(&value));
}

#[test]
fn test_diamond_include_is_valid() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "root.yaml", "left: !include left.yaml\nright: !include right.yaml\n");
    write(root, "left.yaml", "shared: !include shared.yaml\n");
    write(root, "right.yaml", "shared: !include shared.yaml\n");
    write(root, "shared.yaml", "value: 42\n");

    let value = IncludeResolver::resolve_file(root.join("root.yaml")).unwrap();
    assert_eq!(
        value,
        json!({
            "left": {"shared": {"value": 42}},
            "right": {"shared": {"value": 42}}
        })
    );
}

#[test]
fn test_same_file_twice_in_one_document() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "root.yaml", "a: !include part.yaml\nb: !include ./part.yaml\n");
    write(root, "part.yaml", "x: 1\n");

    let value = IncludeResolver::resolve_file(root.join("root.yaml")).unwrap();
    assert_eq!(value, json!({"a": {"x": 1}, "b": {"x": 1}}));
}

#[test]
fn test_self_include_is_circular() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "self.yaml", "me: !include self.yaml\n");

    let err = IncludeResolver::resolve_file(root.join("self.yaml")).unwrap_err();
    assert_eq!(chain_names(&err), vec!["self.yaml", "self.yaml"]);
}

#[test]
fn test_two_file_cycle() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "a.yaml", "b: !include b.yaml\n");
    write(root, "b.yaml", "a: !include a.yaml\n");

    let err = IncludeResolver::resolve_file(root.join("a.yaml")).unwrap_err();
    assert_eq!(chain_names(&err), vec!["a.yaml", "b.yaml", "a.yaml"]);
    assert!(err.to_string().starts_with("Circular include detected: "));
}

#[test]
fn test_three_file_cycle_through_subdirectories() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "a.yaml", "next: !include sub/b.yaml\n");
    write(root, "sub/b.yaml", "next: !include ../c.yaml\n");
    write(root, "c.yaml", "next: !include ./sub/../a.yaml\n");

    let err = IncludeResolver::resolve_file(root.join("a.yaml")).unwrap_err();
    assert_eq!(chain_names(&err), vec!["a.yaml", "b.yaml", "c.yaml", "a.yaml"]);
}

#[test]
fn test_cycle_below_root_reports_only_its_chain() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "root.yaml", "x: !include b.yaml\n");
    write(root, "b.yaml", "y: !include c.yaml\n");
    write(root, "c.yaml", "z: !include b.yaml\n");

    let err = IncludeResolver::resolve_file(root.join("root.yaml")).unwrap_err();
    assert_eq!(
        chain_names(&err),
        vec!["root.yaml", "b.yaml", "c.yaml", "b.yaml"]
    );
}

#[test]
fn test_missing_include_names_both_files() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "root.yaml", "x: !include missing.yaml\n");

    let err = IncludeResolver::resolve_file(root.join("root.yaml")).unwrap_err();
    match &err {
        DocumentError::IncludeNotFound { path, included_from } => {
            assert!(path.ends_with("missing.yaml"));
            assert!(included_from.ends_with("root.yaml"));
        }
        other => panic!("expected missing include, got {:?}", other),
    }
    assert!(err.to_string().starts_with("Include file not found: "));
}

#[test]
fn test_first_error_follows_document_order() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write(root, "root.yaml", "a: !include first.yaml\nb: !include second.yaml\n");
    write(root, "first.yaml", "x: !include gone-1.yaml\n");
    write(root, "second.yaml", "x: !include gone-2.yaml\n");

    let err = IncludeResolver::resolve_file(root.join("root.yaml")).unwrap_err();
    assert!(err.to_string().contains("gone-1.yaml"));
}

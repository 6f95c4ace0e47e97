//! Integration tests for handlers reading and writing auxiliary files.

use std::fs;
use std::path::PathBuf;

use serde_json::json;
use tempfile::tempdir;

use tenant_assets::{
    AssetBundle, AssetHandler, CrossReferences, DirectoryReader, FileWrite, Format,
    HandlerRegistry, LoadContext, SaveContext,
};
use tenant_document::{
    DocumentLoader, KeywordEngine, KeywordMappings, LeafPath, PathSegment, ProvenanceIndex,
    SubstitutionMode,
};

const ACTION_CODE: &str = "const env = '##ENV##';\n";

fn loader() -> DocumentLoader {
    let mut mappings = KeywordMappings::new();
    mappings.insert("ENV".into(), json!("prod"));
    DocumentLoader::new(KeywordEngine::new(mappings, false))
}

fn code_leaf() -> LeafPath {
    LeafPath::root()
        .key("actions")
        .child(PathSegment::Item {
            field: "name".into(),
            value: "notify".into(),
        })
        .key("code")
}

#[test]
fn test_yaml_code_file_loaded_with_provenance() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("actions")).unwrap();
    fs::write(temp.path().join("actions/notify.js"), ACTION_CODE).unwrap();

    let document = json!({
        "actions": [
            {"name": "notify", "code": "./actions/notify.js"},
            {"name": "inline", "code": "exports.onExecutePostLogin = async () => {};"}
        ]
    });

    let loader = loader();
    let registry = HandlerRegistry::standard();
    let handler = registry.get_required("actions").unwrap();
    let mut provenance = ProvenanceIndex::new();
    let mut ctx = LoadContext::new(&loader, Format::Yaml, temp.path(), &mut provenance);

    let actions = handler.load(&document, &mut ctx).unwrap().unwrap();
    assert_eq!(actions[0]["code"], json!("const env = 'prod';\n"));
    assert_eq!(
        actions[1]["code"],
        json!("exports.onExecutePostLogin = async () => {};")
    );

    let entry = provenance.get(&code_leaf()).unwrap();
    assert_eq!(entry.mode, SubstitutionMode::Text);
    assert_eq!(entry.original_text, ACTION_CODE);
    assert_eq!(provenance.len(), 1);
}

#[test]
fn test_directory_code_file_round_trip() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("actions")).unwrap();
    fs::write(
        root.join("actions/notify.json"),
        r#"{"name": "notify", "code": "./notify.js", "runtime": "node18"}"#,
    )
    .unwrap();
    fs::write(root.join("actions/notify.js"), ACTION_CODE).unwrap();

    let loader = loader();
    let registry = HandlerRegistry::standard();
    let handler = registry.get_required("actions").unwrap();

    let assembled = DirectoryReader::new(root, &loader)
        .assemble([handler.as_ref()])
        .unwrap();
    let mut provenance = assembled.provenance;
    let mut ctx = LoadContext::new(&loader, Format::Directory, root, &mut provenance);
    let actions = handler.load(&assembled.value, &mut ctx).unwrap().unwrap();
    assert_eq!(actions[0]["code"], json!("const env = 'prod';\n"));
    assert!(provenance.contains(&code_leaf()));

    let mut bundle = AssetBundle::new();
    bundle.insert("actions", actions);
    let xrefs = CrossReferences::new();
    let set = handler
        .save(
            &bundle,
            &SaveContext {
                format: Format::Directory,
                cross_references: &xrefs,
            },
        )
        .unwrap();

    assert!(set.fragment.is_none());
    assert_eq!(set.files.len(), 2);
    assert_eq!(
        set.files[0],
        FileWrite::new("actions/notify.js", "const env = 'prod';\n")
    );
    assert_eq!(set.files[1].path, PathBuf::from("actions/notify.json"));
    let saved: serde_json::Value = serde_json::from_str(&set.files[1].contents).unwrap();
    assert_eq!(
        saved,
        json!({"name": "notify", "code": "./notify.js", "runtime": "node18"})
    );
}

#[test]
fn test_missing_code_file_is_an_error() {
    let temp = tempdir().unwrap();
    let document = json!({"rules": [{"name": "gone", "script": "./rules/gone.js"}]});

    let loader = loader();
    let registry = HandlerRegistry::standard();
    let handler = registry.get_required("rules").unwrap();
    let mut provenance = ProvenanceIndex::new();
    let mut ctx = LoadContext::new(&loader, Format::Yaml, temp.path(), &mut provenance);

    let err = handler.load(&document, &mut ctx).unwrap_err();
    assert!(err.to_string().contains("gone.js"));
}

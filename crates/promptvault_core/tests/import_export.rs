use promptvault_core::{
    ExportFormatError, FsStorageBackend, ImportFormatError, Meta, OutputValue, Prompt, PromptError, PromptExport,
    PromptManager, VersionUpdate,
};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn meta(value: Value) -> Meta {
    value.as_object().cloned().unwrap()
}

fn seeded_manager(root: &std::path::Path) -> PromptManager {
    let manager = PromptManager::new(root);
    {
        let mut prompt = manager.get_prompt("/demo/hello").unwrap();
        let outputs: Vec<(&str, OutputValue)> = vec![
            ("gpt-4o", "Hi Alice".into()),
            (
                "llama3",
                OutputValue::structured("Hello, Alice.", meta(json!({"temp": 0.3}))),
            ),
        ];
        prompt
            .add_version("Hello {name}!", outputs, Some(meta(json!({"lang": "en"}))), None)
            .unwrap();
        prompt
            .add_version(
                "Bonjour {name} !",
                [("gpt-4o", "Salut Alice")],
                Some(meta(json!({"lang": "fr"}))),
                Some("french-v1"),
            )
            .unwrap();
        prompt.save(false).unwrap();
    }
    manager
}

#[test]
fn export_document_has_portable_shape() {
    let dir = TempDir::new().unwrap();
    let manager = seeded_manager(&dir.path().join("store"));
    let mut prompt = manager.get_prompt("demo/hello").unwrap();

    let exported = prompt.export(dir.path().join("out/hello.json")).unwrap();
    let document: Value = serde_json::from_str(&fs::read_to_string(exported).unwrap()).unwrap();

    assert_eq!(document["project"], "demo");
    assert_eq!(document["prompt"], "hello");
    let versions = document["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    let french = versions
        .iter()
        .find(|version| version["version"] == "french-v1")
        .unwrap();
    assert_eq!(french["content"], "Bonjour {name} !");
    assert_eq!(
        french["model_outputs"]["gpt-4o"],
        json!({"model_name": "gpt-4o", "output": "Salut Alice", "meta": {}})
    );
    assert_eq!(french["meta"], json!({"lang": "fr"}));
    assert!(french["created_at"].as_str().unwrap().contains('T'));
}

#[test]
fn export_then_import_reconstructs_history() {
    let dir = TempDir::new().unwrap();
    let manager = seeded_manager(&dir.path().join("store"));
    let mut original = manager.get_prompt("demo/hello").unwrap();
    original.select_version("v0001").unwrap();
    let file = original.export(dir.path().join("hello.json")).unwrap();

    let other = FsStorageBackend::new(dir.path().join("other"));
    let mut imported = Prompt::from_export(&other, &file, None).unwrap();

    assert_eq!(imported.project(), "demo");
    assert_eq!(imported.name(), "hello");
    assert!(imported.is_loaded());
    assert_eq!(imported.versions().unwrap(), original.versions().unwrap());
    assert_eq!(imported.latest().unwrap().unwrap().version, "v0001");
}

#[test]
fn import_with_destination_persists_under_new_path() {
    let dir = TempDir::new().unwrap();
    let manager = seeded_manager(&dir.path().join("store"));
    let mut source = manager.get_prompt("demo/hello").unwrap();
    source.select_version("french-v1").unwrap();
    let file = source.export(dir.path().join("hello.json")).unwrap();

    let mut copy = manager
        .import_prompt(&file, Some("/newproj/hello_copy"))
        .unwrap();
    assert_eq!(copy.path(), "newproj/hello_copy");
    assert_eq!(copy.latest().unwrap().unwrap().content, "Bonjour {name} !");

    let mut reloaded = manager.get_prompt("newproj/hello_copy").unwrap();
    assert_eq!(reloaded.version_labels().unwrap(), vec!["french-v1", "v0001"]);
    assert_eq!(
        reloaded.get_version("v0001").unwrap().model_outputs["llama3"].meta["temp"],
        json!(0.3)
    );
    assert!(manager.list_projects().unwrap().contains(&"newproj".to_string()));
}

#[test]
fn import_overwrites_existing_destination_versions() {
    let dir = TempDir::new().unwrap();
    let manager = seeded_manager(&dir.path().join("store"));
    let mut source = manager.get_prompt("demo/hello").unwrap();
    source
        .modify_version("v0001", VersionUpdate::new().content("Hello v2"))
        .unwrap();
    let file = source.export(dir.path().join("hello.json")).unwrap();

    manager.import_prompt(&file, None).unwrap();

    let mut reloaded = manager.get_prompt("demo/hello").unwrap();
    assert_eq!(reloaded.get_version("v0001").unwrap().content, "Hello v2");
}

#[test]
fn missing_versions_key_is_bad_format_and_creates_nothing() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("store");
    let manager = PromptManager::new(&root);
    let file = dir.path().join("broken.json");
    fs::write(&file, json!({"project": "demo", "prompt": "hello"}).to_string()).unwrap();

    let err = manager.import_prompt(&file, None).unwrap_err();
    assert!(matches!(
        err,
        PromptError::ImportBadFormat(ImportFormatError::Document(_))
    ));
    assert!(!root.exists());
    assert!(manager.list_projects().unwrap().is_empty());
}

#[test]
fn unreadable_or_malformed_sources_are_bad_format() {
    let dir = TempDir::new().unwrap();
    let manager = PromptManager::new(dir.path().join("store"));

    let err = manager
        .import_prompt(dir.path().join("absent.json"), None)
        .unwrap_err();
    assert!(matches!(
        err,
        PromptError::ImportBadFormat(ImportFormatError::Read { .. })
    ));

    let file = dir.path().join("garbage.json");
    fs::write(&file, "{ not json").unwrap();
    let err = manager.import_prompt(&file, None).unwrap_err();
    assert!(matches!(err, PromptError::ImportBadFormat(_)));
}

#[test]
fn import_accepts_naive_timestamps_and_missing_meta() {
    let dir = TempDir::new().unwrap();
    let manager = PromptManager::new(dir.path().join("store"));
    let file = dir.path().join("legacy.json");
    let document = json!({
        "project": "demo",
        "prompt": "legacy",
        "versions": [{
            "version": "v0001",
            "content": "Hello",
            "model_outputs": {"gpt": {"model_name": "gpt", "output": "Hi"}},
            "created_at": "2024-03-01T12:00:00.500000"
        }]
    });
    fs::write(&file, document.to_string()).unwrap();

    let mut prompt = manager.import_prompt(&file, None).unwrap();
    let version = prompt.get_version("v0001").unwrap();
    assert!(version.meta.is_empty());
    assert_eq!(
        version.created_at.to_rfc3339(),
        "2024-03-01T12:00:00.500+00:00"
    );
}

#[test]
fn unusable_document_names_are_bad_format_and_create_nothing() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("store");
    let manager = PromptManager::new(&root);
    let file = dir.path().join("escape.json");
    let document = json!({"project": "..", "prompt": "hello", "versions": []});
    fs::write(&file, document.to_string()).unwrap();

    let err = manager.import_prompt(&file, None).unwrap_err();
    assert!(matches!(
        err,
        PromptError::ImportBadFormat(ImportFormatError::Document(
            ExportFormatError::InvalidName { kind: "project", .. }
        ))
    ));
    assert!(!root.exists());

    let imported = manager.import_prompt(&file, Some("demo/rescued")).unwrap();
    assert_eq!(imported.path(), "demo/rescued");
}

#[test]
fn invalid_destination_is_rejected_before_provisioning() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("store");
    let manager = seeded_manager(&root);
    let mut source = manager.get_prompt("demo/hello").unwrap();
    let file = source.export(dir.path().join("hello.json")).unwrap();

    let err = manager.import_prompt(&file, Some("only-project")).unwrap_err();
    assert!(matches!(err, PromptError::InvalidPath(_)));
    assert_eq!(manager.list_projects().unwrap(), vec!["demo"]);
}

#[test]
fn export_document_parses_back_through_public_api() {
    let dir = TempDir::new().unwrap();
    let manager = seeded_manager(&dir.path().join("store"));
    let mut prompt = manager.get_prompt("demo/hello").unwrap();

    let json = prompt.export_json().unwrap();
    let parsed = PromptExport::from_json(&json).unwrap();
    assert_eq!(parsed, prompt.export_document().unwrap());
}

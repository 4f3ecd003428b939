use promptvault_core::{PromptError, PromptManager, PromptPath, StorageError, VaultConfig};
use tempfile::TempDir;

#[test]
fn get_prompt_accepts_all_path_forms_and_provisions_directories() {
    let dir = TempDir::new().unwrap();
    let manager = PromptManager::new(dir.path());

    let slashed = manager.get_prompt("/demo/greeting").unwrap();
    let bare = manager.get_prompt("demo/farewell").unwrap();
    let pair = manager.get_prompt(("other", "intro")).unwrap();
    let array = manager.get_prompt(["other", "outro"]).unwrap();
    let owned = manager.get_prompt(String::from("demo/hello/j2")).unwrap();
    let typed = manager.get_prompt(PromptPath::new("typed", "p")).unwrap();

    assert_eq!(slashed.path(), "demo/greeting");
    assert_eq!(bare.path(), "demo/farewell");
    assert_eq!(pair.path(), "other/intro");
    assert_eq!(array.path(), "other/outro");
    assert_eq!(owned.name(), "hello/j2");
    assert_eq!(typed.project(), "typed");

    assert!(dir.path().join("demo/greeting").is_dir());
    assert!(dir.path().join("demo/hello/j2").is_dir());
    assert_eq!(
        manager.list_projects().unwrap(),
        vec!["demo", "other", "typed"]
    );
}

#[test]
fn project_lists_its_prompts() {
    let dir = TempDir::new().unwrap();
    let manager = PromptManager::new(dir.path());
    manager.get_prompt("demo/b").unwrap();
    manager.get_prompt("demo/a").unwrap();

    let project = manager.get_project("demo").unwrap();
    assert_eq!(project.name(), "demo");
    assert_eq!(project.list_prompts().unwrap(), vec!["a", "b"]);
    assert!(project.exists_prompt("a").unwrap());
    assert!(!project.exists_prompt("c").unwrap());

    let empty = manager.get_project("fresh").unwrap();
    assert!(empty.list_prompts().unwrap().is_empty());
}

#[test]
fn get_prompt_does_not_load_until_read() {
    let dir = TempDir::new().unwrap();
    let manager = PromptManager::new(dir.path());
    let mut prompt = manager.get_prompt("demo/greeting").unwrap();

    assert!(!prompt.is_loaded());
    assert!(prompt.versions().unwrap().is_empty());
    assert!(prompt.is_loaded());
}

#[test]
fn malformed_paths_are_rejected() {
    let dir = TempDir::new().unwrap();
    let manager = PromptManager::new(dir.path());

    assert!(matches!(
        manager.get_prompt("no-separator").err().unwrap(),
        PromptError::InvalidPath(_)
    ));
    assert!(matches!(
        manager.get_prompt("../escape/p").err().unwrap(),
        PromptError::Storage(_)
    ));
    assert!(manager.list_projects().unwrap().is_empty());
}

#[test]
fn manager_can_be_built_from_config() {
    let dir = TempDir::new().unwrap();
    let config = VaultConfig::default().with_root(dir.path().join("vault"));
    let manager = PromptManager::from_config(&config);

    manager.get_prompt("demo/greeting").unwrap();
    assert!(dir.path().join("vault/demo/greeting").is_dir());
}

#[test]
fn parent_prompt_operations_leave_nested_prompt_intact() {
    let dir = TempDir::new().unwrap();
    let manager = PromptManager::new(dir.path());
    let mut nested = manager.get_prompt("demo/hello/j2").unwrap();
    nested.add_version("nested body", [("gpt", "Hi!")], None, None).unwrap();
    nested.save(false).unwrap();

    let mut parent = manager.get_prompt("demo/hello").unwrap();
    assert!(parent.version_labels().unwrap().is_empty());
    parent.delete_version("j2").unwrap();
    assert!(dir.path().join("demo/hello/j2/v0001/prompt.txt").is_file());

    parent
        .add_version("parent body", [("gpt", "Yo")], None, Some("j2"))
        .unwrap();
    let err = parent.save(true).unwrap_err();
    assert!(matches!(
        err,
        PromptError::Storage(StorageError::NamespaceConflict(_))
    ));

    let mut reread = manager.get_prompt("demo/hello/j2").unwrap();
    assert_eq!(reread.version_labels().unwrap(), vec!["v0001"]);
    assert_eq!(reread.latest().unwrap().unwrap().content, "nested body");
}

use super::*;
use crate::lifecycle::Lifecycle;
use crate::script::EngineRegistry;
use std::io::Write;

fn context(index: &Arc<EntityIndex>) -> Arc<ExecutionContext> {
    Arc::new(ExecutionContext::new(
        Arc::new(EngineRegistry::with_defaults()),
        index.clone(),
    ))
}

const TREE: &str = r#"
locations: [local, staging]
root:
  name: Pipeline
  type: basic
  children:
    - id: gate
      type: if_else
      language: lua
      script: "true"
      children:
        - type: pause
          duration: 10ms
        - type: basic
    - type: loop
      count: 2
      ignore.exceptions: true
      children:
        - type: run_script
          language: lua
          script: "1 + 1"
"#;

#[test]
fn test_parse_tree() {
    let blueprint = Blueprint::from_yaml(TREE, Path::new(".")).unwrap();
    assert_eq!(
        blueprint.locations,
        vec![Location::new("local"), Location::new("staging")]
    );
    assert_eq!(blueprint.root.name.as_deref(), Some("Pipeline"));
    assert_eq!(blueprint.root.children.len(), 2);

    let gate = &blueprint.root.children[0];
    assert_eq!(gate.id.as_deref(), Some("gate"));
    assert!(matches!(gate.kind, EntityKind::IfElse(ref c) if c.language == "lua"));
    assert!(matches!(
        blueprint.root.children[1].kind,
        EntityKind::Loop(LoopConfig { count: 2, ignore_exceptions: true })
    ));
}

#[test]
fn test_instantiate_assigns_ids_and_registers() {
    let blueprint = Blueprint::from_yaml(TREE, Path::new(".")).unwrap();
    let index = Arc::new(EntityIndex::new());
    let root = blueprint.instantiate(&context(&index), &index).unwrap();

    assert_eq!(root.id(), ROOT_ID);
    assert_eq!(root.display_name(), "Pipeline");
    let ids: Vec<_> = root.children().iter().map(|c| c.id().to_string()).collect();
    assert_eq!(ids, vec!["gate", "root.1"]);
    assert_eq!(root.children()[0].children()[0].id(), "gate.0");
    assert_eq!(index.len(), 6);
    assert!(index.get("root.1.0").is_some());
}

#[tokio::test]
async fn test_instantiated_tree_runs() {
    let blueprint = Blueprint::from_yaml(TREE, Path::new(".")).unwrap();
    let index = Arc::new(EntityIndex::new());
    let root = blueprint.instantiate(&context(&index), &index).unwrap();

    let startable = root.as_startable().unwrap();
    startable.start(&blueprint.locations).await.unwrap();
    assert_eq!(root.sensors().service_state(), Some(Lifecycle::Running));

    let gate = index.get("gate").unwrap();
    assert_eq!(gate.children()[0].sensors().service_state(), Some(Lifecycle::Running));
    assert_eq!(gate.children()[1].sensors().service_state(), None);

    let script = index.get("root.1.0").unwrap();
    assert_eq!(script.sensors().get_as::<i64>("script.result"), Some(2));

    startable.stop().await.unwrap();
    assert_eq!(root.sensors().service_state(), Some(Lifecycle::Stopped));
}

#[test]
fn test_duplicate_ids_rejected() {
    let yaml = r#"
root:
  type: basic
  children:
    - id: twin
      type: basic
    - id: twin
      type: basic
"#;
    let blueprint = Blueprint::from_yaml(yaml, Path::new(".")).unwrap();
    let index = Arc::new(EntityIndex::new());
    let Err(err) = blueprint.instantiate(&context(&index), &index) else {
        panic!("duplicate ids should be rejected");
    };
    assert!(matches!(err, FlowError::Config(ref msg) if msg.contains("twin")));
}

#[test]
fn test_unknown_type_reports_parse_error() {
    let err = Blueprint::from_yaml("root:\n  type: teleport\n", Path::new(".")).unwrap_err();
    assert!(matches!(err, FlowError::ConfigParse { .. }));
}

#[test]
fn test_missing_blueprint() {
    let dir = tempfile::tempdir().unwrap();
    let err = Blueprint::load(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, FlowError::ConfigNotFound(_)));
}

#[tokio::test]
async fn test_relative_script_file_resolves_against_blueprint_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut script = std::fs::File::create(dir.path().join("decide.lua")).unwrap();
    write!(script, "return false").unwrap();

    let path = dir.path().join("flow.yaml");
    std::fs::write(
        &path,
        "root:\n  type: if\n  language: lua\n  file: decide.lua\n  children:\n    - type: basic\n",
    )
    .unwrap();

    let blueprint = Blueprint::load(&path).unwrap();
    assert_eq!(blueprint.base_dir, dir.path());

    let index = Arc::new(EntityIndex::new());
    let root = blueprint.instantiate(&context(&index), &index).unwrap();
    root.as_startable().unwrap().start(&[]).await.unwrap();

    assert_eq!(root.sensors().get_as::<bool>("condition.result"), Some(false));
    assert_eq!(root.children()[0].sensors().service_state(), None);
}

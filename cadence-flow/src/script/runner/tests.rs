use super::*;
use crate::config::ScriptLocation;
use crate::directory::EntityIndex;
use crate::entity::BasicEntity;
use crate::script::{EngineError, EngineRegistry, ScriptScope};
use std::io::Write;

/// Engine that echoes the source back and cannot invoke functions.
struct EchoEngine;

struct EchoScope;

impl ScriptEngine for EchoEngine {
    fn language(&self) -> &str {
        "echo"
    }

    fn new_scope(
        &self,
        _bindings: &BTreeMap<String, EntityRef>,
        _deadline: Option<Instant>,
    ) -> std::result::Result<Box<dyn ScriptScope>, EngineError> {
        Ok(Box::new(EchoScope))
    }
}

impl ScriptScope for EchoScope {
    fn eval(&mut self, source: &str, _origin: &str) -> std::result::Result<ScriptValue, EngineError> {
        Ok(ScriptValue::String(source.to_string()))
    }

    fn try_expression(&mut self, _source: &str) -> Option<ScriptValue> {
        None
    }
}

fn context_with(index: Arc<EntityIndex>) -> Arc<ExecutionContext> {
    let mut engines = EngineRegistry::with_defaults();
    engines.register(Arc::new(EchoEngine));
    Arc::new(ExecutionContext::new(Arc::new(engines), index))
}

fn context() -> Arc<ExecutionContext> {
    context_with(Arc::new(EntityIndex::new()))
}

async fn run(config: ScriptConfig) -> Result<ScriptValue> {
    let owner = EntityCore::new("owner");
    ScriptRunner::new(config, context()).run(&owner).await
}

// ============================================================================
// Engine and source selection
// ============================================================================

#[tokio::test]
async fn test_unknown_language_names_identifier() {
    let err = run(ScriptConfig::new("cobol").with_script("1")).await.unwrap_err();
    assert!(matches!(err, FlowError::EngineNotFound(ref lang) if lang == "cobol"));
    assert_eq!(err.to_string(), "Cannot find the script engine for [cobol]");
}

#[tokio::test]
async fn test_inline_script_result() {
    let value = run(ScriptConfig::new("lua").with_script("6 * 7")).await.unwrap();
    assert_eq!(value, ScriptValue::Integer(42));
}

#[tokio::test]
async fn test_file_wins_over_inline_script() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "return 'from file'").unwrap();

    let config = ScriptConfig::new("lua")
        .with_script("'inline'")
        .with_file(ScriptLocation::from(file.path()));
    assert_eq!(run(config).await.unwrap(), ScriptValue::from("from file"));
}

#[tokio::test]
async fn test_file_url_is_read() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "return 5").unwrap();
    let url = url::Url::from_file_path(file.path()).unwrap();

    let config = ScriptConfig::new("lua").with_file(ScriptLocation::Url(url));
    assert_eq!(run(config).await.unwrap(), ScriptValue::Integer(5));
}

#[tokio::test]
async fn test_missing_file_names_location() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.lua");

    let config = ScriptConfig::new("lua").with_file(ScriptLocation::from(missing.as_path()));
    let err = run(config).await.unwrap_err();
    assert!(matches!(err, FlowError::ScriptFileNotFound(_)));
    assert!(err.to_string().contains(&missing.display().to_string()));
}

#[tokio::test]
async fn test_remote_url_is_io_error() {
    let config = ScriptConfig::new("lua")
        .with_file(ScriptLocation::parse("https://example.com/check.lua").unwrap());
    let err = run(config).await.unwrap_err();
    assert!(matches!(err, FlowError::ScriptIo { .. }));
}

#[tokio::test]
async fn test_no_source_is_config_error() {
    let err = run(ScriptConfig::new("lua")).await.unwrap_err();
    assert!(matches!(err, FlowError::Config(_)));
}

#[tokio::test]
async fn test_evaluation_failure_wrapped() {
    let err = run(ScriptConfig::new("lua").with_script("error('bad input')"))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::ScriptEvaluation(_)));
    assert!(err.to_string().contains("bad input"));
}

#[tokio::test]
async fn test_result_published_on_owner() {
    let owner = EntityCore::new("owner");
    ScriptRunner::new(ScriptConfig::new("lua").with_script("{ok = true}"), context())
        .run(&owner)
        .await
        .unwrap();
    assert_eq!(
        owner.sensors().get(SCRIPT_RESULT),
        Some(serde_json::json!({"ok": true}))
    );
}

// ============================================================================
// Invocation
// ============================================================================

#[tokio::test]
async fn test_invoke_with_expression_and_literal_args() {
    let config = ScriptConfig::new("lua")
        .with_script("function label(n, name) return name .. '=' .. n end")
        .with_invoke("label")
        .with_args(["(10 - 1)", "ONE"]);
    assert_eq!(run(config).await.unwrap(), ScriptValue::from("ONE=9"));
}

#[tokio::test]
async fn test_invoke_passes_function_valued_args_as_literals() {
    let config = ScriptConfig::new("lua")
        .with_script("function describe(a, b) return type(a) .. ':' .. tostring(a) .. ',' .. b end")
        .with_invoke("describe")
        .with_args(["print", "(10 - 1)"]);
    assert_eq!(run(config).await.unwrap(), ScriptValue::from("string:print,9"));
}

#[tokio::test]
async fn test_invoke_missing_function() {
    let config = ScriptConfig::new("lua")
        .with_script("x = 1")
        .with_invoke("missing");
    let err = run(config).await.unwrap_err();
    assert!(matches!(err, FlowError::FunctionNotFound(ref name) if name == "missing"));
}

#[tokio::test]
async fn test_invoke_failure_wrapped() {
    let config = ScriptConfig::new("lua")
        .with_script("function explode() error('kaboom') end")
        .with_invoke("explode");
    let err = run(config).await.unwrap_err();
    assert!(matches!(err, FlowError::FunctionInvocation { ref function, .. } if function == "explode"));
}

#[tokio::test]
async fn test_invoke_unsupported_by_engine() {
    let config = ScriptConfig::new("echo").with_script("hello").with_invoke("main");
    let err = run(config).await.unwrap_err();
    assert!(matches!(err, FlowError::InvocationUnsupported(ref lang) if lang == "echo"));
}

// ============================================================================
// Bindings
// ============================================================================

#[tokio::test]
async fn test_binding_by_id_resolves_through_directory() {
    let index = Arc::new(EntityIndex::new());
    let target: EntityRef = Arc::new(BasicEntity::new(EntityCore::new("database")));
    target.sensors().set("port", 5432).unwrap();
    index.register(&target).unwrap();

    let config = ScriptConfig::new("lua")
        .with_script("db:attribute('port')")
        .with_binding("db", BindingTarget::from("database"));
    let owner = EntityCore::new("owner");
    let value = ScriptRunner::new(config, context_with(index))
        .run(&owner)
        .await
        .unwrap();
    assert_eq!(value, ScriptValue::Integer(5432));
}

#[tokio::test]
async fn test_binding_to_live_entity() {
    let target: EntityRef = Arc::new(BasicEntity::new(EntityCore::new("cache")));
    let config = ScriptConfig::new("lua")
        .with_script("c:id()")
        .with_binding("c", BindingTarget::from(target));
    assert_eq!(run(config).await.unwrap(), ScriptValue::from("cache"));
}

#[tokio::test]
async fn test_unresolvable_binding_fails() {
    let config = ScriptConfig::new("lua")
        .with_script("true")
        .with_binding("ghost", BindingTarget::from("nowhere"));
    let err = run(config).await.unwrap_err();
    match err {
        FlowError::BindingResolution { name, target, .. } => {
            assert_eq!(name, "ghost");
            assert_eq!(target, "nowhere");
        }
        other => panic!("expected binding failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancelled_lookup_fails_binding() {
    let context = context();
    context.cancel();
    let config = ScriptConfig::new("lua")
        .with_script("true")
        .with_binding("x", BindingTarget::from("anything"));
    let owner = EntityCore::new("owner");
    let err = ScriptRunner::new(config, context).run(&owner).await.unwrap_err();
    assert!(matches!(err, FlowError::BindingResolution { ref reason, .. } if reason == "lookup cancelled"));
}

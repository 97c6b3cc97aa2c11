use super::*;
use crate::entity::{BasicEntity, EntityCore};
use crate::script::ResolvedArgument;
use std::sync::Arc;
use std::time::Duration;

fn scope() -> Box<dyn ScriptScope> {
    LuaEngine::new().new_scope(&BTreeMap::new(), None).unwrap()
}

fn scope_with(name: &str, entity: EntityRef) -> Box<dyn ScriptScope> {
    let mut bindings = BTreeMap::new();
    bindings.insert(name.to_string(), entity);
    LuaEngine::new().new_scope(&bindings, None).unwrap()
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn test_expression_without_return() {
    let mut scope = scope();
    assert_eq!(scope.eval("1 + 1 == 2", "test").unwrap(), ScriptValue::Boolean(true));
    assert_eq!(scope.eval("40 + 2", "test").unwrap(), ScriptValue::Integer(42));
}

#[test]
fn test_chunk_with_statements() {
    let mut scope = scope();
    let value = scope
        .eval("local total = 0\nfor i = 1, 4 do total = total + i end\nreturn total", "test")
        .unwrap();
    assert_eq!(value, ScriptValue::Integer(10));
}

#[test]
fn test_fractional_and_string_results() {
    let mut scope = scope();
    assert_eq!(scope.eval("7 / 2", "test").unwrap(), ScriptValue::Number(3.5));
    assert_eq!(
        scope.eval(r#""a" .. "b""#, "test").unwrap(),
        ScriptValue::String("ab".into())
    );
}

#[test]
fn test_tables_convert_to_lists_and_maps() {
    let mut scope = scope();
    assert_eq!(
        scope.eval(r#"{"a", "b"}"#, "test").unwrap(),
        ScriptValue::List(vec!["a".into(), "b".into()])
    );
    let ScriptValue::Map(map) = scope.eval("{port = 8080, tls = false}", "test").unwrap() else {
        panic!("expected a map");
    };
    assert_eq!(map.get("port"), Some(&ScriptValue::Integer(8080)));
    assert_eq!(map.get("tls"), Some(&ScriptValue::Boolean(false)));
}

#[test]
fn test_functions_are_opaque() {
    let mut scope = scope();
    assert_eq!(
        scope.eval("print", "test").unwrap(),
        ScriptValue::Opaque("function".into())
    );
}

#[test]
fn test_undefined_global_is_nil_in_scripts() {
    let mut scope = scope();
    assert_eq!(scope.eval("NOT_DEFINED", "test").unwrap(), ScriptValue::Nil);
}

#[test]
fn test_runtime_error_reported() {
    let mut scope = scope();
    let err = scope.eval(r#"error("kaboom")"#, "broken.lua").unwrap_err();
    assert!(err.message().contains("kaboom"), "got: {}", err);
}

#[test]
fn test_syntax_error_reported() {
    let mut scope = scope();
    assert!(scope.eval("if then", "test").is_err());
}

#[test]
fn test_deadline_interrupts_runaway_script() {
    let deadline = Instant::now() + Duration::from_millis(50);
    let mut scope = LuaEngine::new().new_scope(&BTreeMap::new(), Some(deadline)).unwrap();
    let err = scope.eval("while true do end", "spin").unwrap_err();
    assert!(err.message().contains("timed out"), "got: {}", err);
}

// ============================================================================
// Expressions as arguments
// ============================================================================

#[test]
fn test_try_expression_evaluates_arithmetic() {
    let mut scope = scope();
    assert_eq!(scope.try_expression("(10 - 1)"), Some(ScriptValue::Integer(9)));
}

#[test]
fn test_try_expression_rejects_undefined_names() {
    let mut scope = scope();
    assert_eq!(scope.try_expression("ONE"), None);
    assert_eq!(scope.try_expression("not even lua"), None);
}

#[test]
fn test_try_expression_sees_script_definitions() {
    let mut scope = scope();
    scope.eval("ONE = 1", "test").unwrap();
    assert_eq!(scope.try_expression("ONE + 1"), Some(ScriptValue::Integer(2)));
}

#[test]
fn test_resolved_argument_falls_back_to_literal() {
    let mut scope = scope();
    assert_eq!(
        ResolvedArgument::resolve(scope.as_mut(), "(10 - 1)"),
        ResolvedArgument::Evaluated(ScriptValue::Integer(9))
    );
    let literal = ResolvedArgument::resolve(scope.as_mut(), "ONE");
    assert_eq!(literal, ResolvedArgument::Literal("ONE".into()));
    assert_eq!(literal.into_value(), ScriptValue::String("ONE".into()));
}

#[test]
fn test_resolved_argument_keeps_function_names_literal() {
    let mut scope = scope();
    scope.eval("function greet() return 'hi' end", "test").unwrap();
    assert_eq!(
        ResolvedArgument::resolve(scope.as_mut(), "print"),
        ResolvedArgument::Literal("print".into())
    );
    assert_eq!(
        ResolvedArgument::resolve(scope.as_mut(), "{ greet }"),
        ResolvedArgument::Literal("{ greet }".into())
    );
    assert_eq!(
        ResolvedArgument::resolve(scope.as_mut(), "greet()"),
        ResolvedArgument::Evaluated(ScriptValue::from("hi"))
    );
}

// ============================================================================
// Invocation
// ============================================================================

#[test]
fn test_invoke_defined_function() {
    let mut scope = scope();
    scope
        .eval("function describe(n, label) return label .. ':' .. n end", "test")
        .unwrap();
    let invoker = scope.invoker().expect("lua supports invocation");
    let value = invoker
        .invoke("describe", vec![ScriptValue::Integer(9), "ONE".into()])
        .unwrap();
    assert_eq!(value, ScriptValue::String("ONE:9".into()));
}

#[test]
fn test_invoke_missing_function() {
    let mut scope = scope();
    scope.eval("answer = 42", "test").unwrap();
    let invoker = scope.invoker().unwrap();
    assert!(matches!(
        invoker.invoke("nope", vec![]),
        Err(InvokeError::NotFound(name)) if name == "nope"
    ));
    assert!(matches!(
        invoker.invoke("answer", vec![]),
        Err(InvokeError::NotFound(_))
    ));
}

#[test]
fn test_invoke_failure_is_engine_error() {
    let mut scope = scope();
    scope.eval("function fail() error('nope') end", "test").unwrap();
    let invoker = scope.invoker().unwrap();
    assert!(matches!(invoker.invoke("fail", vec![]), Err(InvokeError::Engine(_))));
}

// ============================================================================
// Bound entities
// ============================================================================

#[test]
fn test_bound_entity_methods() {
    let entity: EntityRef = Arc::new(BasicEntity::new(
        EntityCore::new("db").with_name("Database"),
    ));
    entity.sensors().set("replicas", 3).unwrap();

    let mut scope = scope_with("target", entity.clone());
    assert_eq!(scope.eval("target:id()", "test").unwrap(), ScriptValue::from("db"));
    assert_eq!(scope.eval("target:name()", "test").unwrap(), ScriptValue::from("Database"));
    assert_eq!(scope.eval("target:is_up()", "test").unwrap(), ScriptValue::Boolean(false));
    assert_eq!(scope.eval("target:state()", "test").unwrap(), ScriptValue::Nil);
    assert_eq!(
        scope.eval("target:attribute('replicas') + 1", "test").unwrap(),
        ScriptValue::Integer(4)
    );
    assert_eq!(
        scope.eval("tostring(target)", "test").unwrap(),
        ScriptValue::from("Entity[db]")
    );
}

#[test]
fn test_bound_entity_set_attribute() {
    let entity: EntityRef = Arc::new(BasicEntity::new(EntityCore::new("web")));
    let mut scope = scope_with("web", entity.clone());

    scope.eval("web:set_attribute('url', 'http://web')", "test").unwrap();
    assert_eq!(entity.sensors().get_as::<String>("url").as_deref(), Some("http://web"));

    let err = scope
        .eval("web:set_attribute('service.isUp', true)", "test")
        .unwrap_err();
    assert!(err.message().contains("service.isUp"), "got: {}", err);
}

#[test]
fn test_returned_entity_round_trips() {
    let entity: EntityRef = Arc::new(BasicEntity::new(EntityCore::new("svc")));
    let mut scope = scope_with("svc", entity.clone());
    let ScriptValue::Entity(returned) = scope.eval("svc", "test").unwrap() else {
        panic!("expected an entity");
    };
    assert!(Arc::ptr_eq(&returned, &entity));
}

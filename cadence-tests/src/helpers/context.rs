//! Execution contexts for tests

use cadence_flow::ExecutionContext;
use cadence_flow::directory::EntityIndex;
use cadence_flow::script::EngineRegistry;
use std::sync::Arc;

use super::engines::EchoEngine;

/// Context with the default engines plus [`EchoEngine`], backed by a fresh
/// entity index.
pub fn test_context() -> (Arc<ExecutionContext>, Arc<EntityIndex>) {
    let mut engines = EngineRegistry::with_defaults();
    engines.register(Arc::new(EchoEngine));
    test_context_with(engines)
}

pub fn test_context_with(engines: EngineRegistry) -> (Arc<ExecutionContext>, Arc<EntityIndex>) {
    let index = Arc::new(EntityIndex::new());
    let context = Arc::new(ExecutionContext::new(Arc::new(engines), index.clone()));
    (context, index)
}

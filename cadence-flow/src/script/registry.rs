use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{LuaEngine, ScriptEngine};

/// Case-sensitive map from language identifier to engine.
#[derive(Default, Clone)]
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn ScriptEngine>>,
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the embedded Luau engine under `lua` and `luau`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let lua: Arc<dyn ScriptEngine> = Arc::new(LuaEngine::new());
        registry.register_as("lua", lua.clone());
        registry.register_as("luau", lua);
        registry
    }

    /// Register under the engine's own language identifier.
    pub fn register(&mut self, engine: Arc<dyn ScriptEngine>) -> Option<Arc<dyn ScriptEngine>> {
        let language = engine.language().to_string();
        self.engines.insert(language, engine)
    }

    pub fn register_as(
        &mut self,
        language: impl Into<String>,
        engine: Arc<dyn ScriptEngine>,
    ) -> Option<Arc<dyn ScriptEngine>> {
        self.engines.insert(language.into(), engine)
    }

    pub fn get(&self, language: &str) -> Option<Arc<dyn ScriptEngine>> {
        self.engines.get(language).cloned()
    }

    /// Registered identifiers, sorted.
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.engines.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }
}

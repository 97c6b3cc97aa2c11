//! Embedded Luau engine.
//!
//! Every scope owns its own `Lua` state. Scripts run in a custom environment
//! table holding the bindings, with `__index` falling back to the standard
//! globals. Bound entities are userdata exposing `id`, `name`, `state`,
//! `is_up`, `attribute` and `set_attribute`.

use mlua::{
    AnyUserData, Function, Lua, MetaMethod, MultiValue, Result as LuaResult, Table, UserData,
    UserDataMethods, Value,
};
use std::collections::BTreeMap;
use std::time::Instant;

use super::{EngineError, FunctionInvoker, InvokeError, ScriptEngine, ScriptScope, ScriptValue};
use crate::entity::EntityRef;

/// Nesting limit when converting tables.
const MAX_DEPTH: usize = 32;

/// Wraps a scope so that reading an undefined name raises instead of
/// yielding nil. Used for argument expressions only.
const STRICT_PROXY: &str = r#"
local scope = ...
return setmetatable({}, {
    __index = function(_, key)
        local value = scope[key]
        if value == nil then
            error("undefined name '" .. tostring(key) .. "'", 2)
        end
        return value
    end,
})
"#;

impl From<mlua::Error> for EngineError {
    fn from(e: mlua::Error) -> Self {
        EngineError::new(e.to_string())
    }
}

#[derive(Debug, Default)]
pub struct LuaEngine;

impl LuaEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEngine for LuaEngine {
    fn language(&self) -> &str {
        "lua"
    }

    fn new_scope(
        &self,
        bindings: &BTreeMap<String, EntityRef>,
        deadline: Option<Instant>,
    ) -> Result<Box<dyn ScriptScope>, EngineError> {
        Ok(Box::new(LuaScope::new(bindings, deadline)?))
    }
}

struct LuaScope {
    lua: Lua,
    env: Table,
    strict: Option<Table>,
}

impl LuaScope {
    fn new(bindings: &BTreeMap<String, EntityRef>, deadline: Option<Instant>) -> LuaResult<Self> {
        let lua = Lua::new();

        if let Some(deadline) = deadline {
            lua.set_interrupt(move |_| {
                if Instant::now() > deadline {
                    Err(mlua::Error::RuntimeError("script timed out".into()))
                } else {
                    Ok(mlua::VmState::Continue)
                }
            });
        }

        let env = lua.create_table()?;
        for (name, entity) in bindings {
            env.raw_set(name.as_str(), lua.create_userdata(LuaEntity(entity.clone()))?)?;
        }
        let meta = lua.create_table()?;
        meta.set("__index", lua.globals())?;
        env.set_metatable(Some(meta));

        Ok(Self {
            lua,
            env,
            strict: None,
        })
    }

    /// Compile `source` as an expression if it is one, otherwise as a chunk.
    fn compile(&self, source: &str, origin: &str) -> LuaResult<Function> {
        let expression = format!("return {}", source);
        if let Ok(func) = self
            .lua
            .load(&expression)
            .set_name(origin)
            .set_environment(self.env.clone())
            .into_function()
        {
            return Ok(func);
        }
        self.lua
            .load(source)
            .set_name(origin)
            .set_environment(self.env.clone())
            .into_function()
    }

    fn strict_env(&mut self) -> LuaResult<Table> {
        if let Some(strict) = &self.strict {
            return Ok(strict.clone());
        }
        let strict: Table = self
            .lua
            .load(STRICT_PROXY)
            .set_name("strict")
            .call(self.env.clone())?;
        self.strict = Some(strict.clone());
        Ok(strict)
    }
}

impl ScriptScope for LuaScope {
    fn eval(&mut self, source: &str, origin: &str) -> Result<ScriptValue, EngineError> {
        let func = self.compile(source, origin)?;
        let value: Value = func.call(())?;
        Ok(lua_to_script_value(value)?)
    }

    fn try_expression(&mut self, source: &str) -> Option<ScriptValue> {
        let strict = self.strict_env().ok()?;
        let func = self
            .lua
            .load(format!("return {}", source))
            .set_name("argument")
            .set_environment(strict)
            .into_function()
            .ok()?;
        let value: Value = func.call(()).ok()?;
        lua_to_script_value(value).ok()
    }

    fn invoker(&mut self) -> Option<&mut dyn FunctionInvoker> {
        Some(self)
    }
}

impl FunctionInvoker for LuaScope {
    fn invoke(
        &mut self,
        function: &str,
        args: Vec<ScriptValue>,
    ) -> Result<ScriptValue, InvokeError> {
        let func = match self.env.get::<Value>(function).map_err(EngineError::from)? {
            Value::Function(func) => func,
            _ => return Err(InvokeError::NotFound(function.to_string())),
        };
        let args = args
            .iter()
            .map(|arg| script_value_to_lua(&self.lua, arg))
            .collect::<LuaResult<Vec<_>>>()
            .map_err(EngineError::from)?;
        let value: Value = func
            .call(MultiValue::from_vec(args))
            .map_err(EngineError::from)?;
        Ok(lua_to_script_value(value).map_err(EngineError::from)?)
    }
}

/// Entity handle exposed to scripts.
struct LuaEntity(EntityRef);

impl UserData for LuaEntity {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("id", |_, this, ()| Ok(this.0.id().to_string()));
        methods.add_method("name", |_, this, ()| Ok(this.0.display_name().to_string()));
        methods.add_method("state", |_, this, ()| {
            Ok(this.0.sensors().service_state().map(|s| s.as_str()))
        });
        methods.add_method("is_up", |_, this, ()| Ok(this.0.sensors().is_service_up()));
        methods.add_method("attribute", |lua, this, key: String| {
            match this.0.sensors().get(&key) {
                Some(json) => script_value_to_lua(lua, &ScriptValue::from(json)),
                None => Ok(Value::Nil),
            }
        });
        methods.add_method("set_attribute", |_, this, (key, value): (String, Value)| {
            let json = lua_to_script_value(value)?.to_json().ok_or_else(|| {
                mlua::Error::RuntimeError(format!("attribute '{}' needs a plain value", key))
            })?;
            this.0
                .sensors()
                .set(&key, json)
                .map_err(|e| mlua::Error::RuntimeError(e.to_string()))
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("Entity[{}]", this.0.id()))
        });
    }
}

/// Convert a Lua value to a [`ScriptValue`].
///
/// Whole numbers become `Integer`; tables with keys `1..=n` become lists,
/// other tables maps with string keys.
pub(super) fn lua_to_script_value(value: Value) -> LuaResult<ScriptValue> {
    lua_to_script_value_inner(value, 0)
}

fn lua_to_script_value_inner(value: Value, depth: usize) -> LuaResult<ScriptValue> {
    if depth > MAX_DEPTH {
        return Err(mlua::Error::RuntimeError(format!(
            "value nested deeper than {} levels",
            MAX_DEPTH
        )));
    }
    Ok(match value {
        Value::Nil => ScriptValue::Nil,
        Value::Boolean(b) => ScriptValue::Boolean(b),
        Value::Integer(i) => ScriptValue::Integer(i64::from(i)),
        Value::Number(n) => number_to_script_value(n),
        Value::String(s) => ScriptValue::String(s.to_str()?.to_string()),
        Value::Table(table) => table_to_script_value(table, depth)?,
        Value::UserData(ud) => userdata_to_script_value(&ud),
        other => ScriptValue::Opaque(other.type_name().to_string()),
    })
}

fn number_to_script_value(n: f64) -> ScriptValue {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        ScriptValue::Integer(n as i64)
    } else {
        ScriptValue::Number(n)
    }
}

fn userdata_to_script_value(ud: &AnyUserData) -> ScriptValue {
    match ud.borrow::<LuaEntity>() {
        Ok(entity) => ScriptValue::Entity(entity.0.clone()),
        Err(_) => ScriptValue::Opaque("userdata".to_string()),
    }
}

fn table_to_script_value(table: Table, depth: usize) -> LuaResult<ScriptValue> {
    let mut is_array = true;
    let mut max_index = 0i64;
    let mut count = 0i64;

    for pair in table.clone().pairs::<Value, Value>() {
        let (k, _) = pair?;
        count += 1;
        match k {
            Value::Integer(i) if i64::from(i) > 0 => max_index = max_index.max(i64::from(i)),
            Value::Number(n) if n.fract() == 0.0 && n > 0.0 => max_index = max_index.max(n as i64),
            _ => is_array = false,
        }
    }

    if is_array && max_index == count {
        let mut items = Vec::with_capacity(count as usize);
        for value in table.sequence_values::<Value>() {
            items.push(lua_to_script_value_inner(value?, depth + 1)?);
        }
        return Ok(ScriptValue::List(items));
    }

    let mut entries = BTreeMap::new();
    for pair in table.pairs::<Value, Value>() {
        let (k, v) = pair?;
        let key = match k {
            Value::String(s) => s.to_str()?.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => number_to_script_value(n).to_string(),
            other => {
                return Err(mlua::Error::RuntimeError(format!(
                    "table key must be a string or number, got {}",
                    other.type_name()
                )));
            }
        };
        entries.insert(key, lua_to_script_value_inner(v, depth + 1)?);
    }
    Ok(ScriptValue::Map(entries))
}

/// Convert a [`ScriptValue`] into the given Lua state. Opaque values have no
/// Lua form and become nil.
pub(super) fn script_value_to_lua(lua: &Lua, value: &ScriptValue) -> LuaResult<Value> {
    Ok(match value {
        ScriptValue::Nil | ScriptValue::Opaque(_) => Value::Nil,
        ScriptValue::Boolean(b) => Value::Boolean(*b),
        ScriptValue::Integer(i) => match mlua::Integer::try_from(*i) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Number(*i as f64),
        },
        ScriptValue::Number(n) => Value::Number(*n),
        ScriptValue::String(s) => Value::String(lua.create_string(s)?),
        ScriptValue::List(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, script_value_to_lua(lua, item)?)?;
            }
            Value::Table(table)
        }
        ScriptValue::Map(entries) => {
            let table = lua.create_table()?;
            for (k, v) in entries {
                table.raw_set(k.as_str(), script_value_to_lua(lua, v)?)?;
            }
            Value::Table(table)
        }
        ScriptValue::Entity(entity) => {
            Value::UserData(lua.create_userdata(LuaEntity(entity.clone()))?)
        }
    })
}

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::entity::EntityRef;

/// Language-neutral value crossing the engine boundary.
#[derive(Clone)]
pub enum ScriptValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    List(Vec<ScriptValue>),
    Map(BTreeMap<String, ScriptValue>),
    /// A bound entity handed back by the script.
    Entity(EntityRef),
    /// An engine value with no neutral form (functions, threads, ...);
    /// holds the engine's type name.
    Opaque(String),
}

impl ScriptValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Nil => "nil",
            ScriptValue::Boolean(_) => "boolean",
            ScriptValue::Integer(_) => "integer",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::List(_) => "list",
            ScriptValue::Map(_) => "map",
            ScriptValue::Entity(_) => "entity",
            ScriptValue::Opaque(_) => "opaque",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScriptValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ScriptValue::Nil)
    }

    /// Whether the value can be handed back to an engine intact: false when
    /// it, or anything nested in it, is opaque.
    pub fn is_transferable(&self) -> bool {
        match self {
            ScriptValue::Opaque(_) => false,
            ScriptValue::List(items) => items.iter().all(ScriptValue::is_transferable),
            ScriptValue::Map(entries) => entries.values().all(ScriptValue::is_transferable),
            _ => true,
        }
    }

    /// JSON form for publishing as a sensor. `None` for entities, opaque
    /// values and non-finite numbers, or containers holding them.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value;
        Some(match self {
            ScriptValue::Nil => Value::Null,
            ScriptValue::Boolean(b) => Value::Bool(*b),
            ScriptValue::Integer(i) => Value::from(*i),
            ScriptValue::Number(n) => Value::Number(serde_json::Number::from_f64(*n)?),
            ScriptValue::String(s) => Value::String(s.clone()),
            ScriptValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(ScriptValue::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            ScriptValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
            ScriptValue::Entity(_) | ScriptValue::Opaque(_) => return None,
        })
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Nil => f.write_str("Nil"),
            ScriptValue::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            ScriptValue::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            ScriptValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            ScriptValue::String(s) => f.debug_tuple("String").field(s).finish(),
            ScriptValue::List(items) => f.debug_tuple("List").field(items).finish(),
            ScriptValue::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            ScriptValue::Entity(e) => f.debug_tuple("Entity").field(&e.id()).finish(),
            ScriptValue::Opaque(t) => f.debug_tuple("Opaque").field(t).finish(),
        }
    }
}

impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScriptValue::Nil, ScriptValue::Nil) => true,
            (ScriptValue::Boolean(a), ScriptValue::Boolean(b)) => a == b,
            (ScriptValue::Integer(a), ScriptValue::Integer(b)) => a == b,
            (ScriptValue::Number(a), ScriptValue::Number(b)) => a == b,
            (ScriptValue::String(a), ScriptValue::String(b)) => a == b,
            (ScriptValue::List(a), ScriptValue::List(b)) => a == b,
            (ScriptValue::Map(a), ScriptValue::Map(b)) => a == b,
            (ScriptValue::Entity(a), ScriptValue::Entity(b)) => Arc::ptr_eq(a, b),
            (ScriptValue::Opaque(a), ScriptValue::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

/// Strings print raw, so error messages show the literal result.
impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Nil => f.write_str("nil"),
            ScriptValue::Boolean(b) => write!(f, "{}", b),
            ScriptValue::Integer(i) => write!(f, "{}", i),
            ScriptValue::Number(n) => write!(f, "{}", n),
            ScriptValue::String(s) => f.write_str(s),
            ScriptValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            ScriptValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
            ScriptValue::Entity(e) => write!(f, "Entity[{}]", e.id()),
            ScriptValue::Opaque(t) => write!(f, "<{}>", t),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Boolean(b)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Integer(i)
    }
}

impl From<f64> for ScriptValue {
    fn from(n: f64) -> Self {
        ScriptValue::Number(n)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(s)
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ScriptValue::Nil,
            Value::Bool(b) => ScriptValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ScriptValue::Integer(i),
                None => ScriptValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ScriptValue::String(s),
            Value::Array(items) => {
                ScriptValue::List(items.into_iter().map(ScriptValue::from).collect())
            }
            Value::Object(entries) => ScriptValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, ScriptValue::from(v)))
                    .collect(),
            ),
        }
    }
}

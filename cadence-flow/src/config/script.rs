use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use super::deserialize_optional_duration;
use crate::entity::EntityRef;
use crate::errors::{FlowError, Result};

/// Script evaluation settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptConfig {
    /// Engine identifier, matched case-sensitively.
    pub language: String,

    /// Inline script or expression.
    #[serde(default)]
    pub script: Option<String>,

    /// Script source location; wins over `script` when both are set.
    #[serde(default, alias = "script.url")]
    pub file: Option<ScriptLocation>,

    /// Function to call after the script is evaluated.
    #[serde(default)]
    pub invoke: Option<String>,

    /// Raw invocation arguments; each may be an expression.
    #[serde(default, deserialize_with = "deserialize_args")]
    pub args: Vec<String>,

    #[serde(default)]
    pub bindings: BTreeMap<String, BindingTarget>,

    /// Abort evaluation after this long.
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub timeout: Option<Duration>,
}

impl ScriptConfig {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_file(mut self, file: ScriptLocation) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_invoke(mut self, function: impl Into<String>) -> Self {
        self.invoke = Some(function.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>, target: BindingTarget) -> Self {
        self.bindings.insert(name.into(), target);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve a relative file location against `base`.
    pub fn resolve_file_against(mut self, base: &Path) -> Self {
        self.file = self.file.map(|file| file.resolve_against(base));
        self
    }
}

/// Accept scalars of any kind and keep their text.
fn deserialize_args<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_yaml::Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|value| match value {
            serde_yaml::Value::String(s) => Ok(s),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "script argument must be a scalar, got {:?}",
                other
            ))),
        })
        .collect()
}

/// Where a script file lives: a filesystem path or a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLocation {
    Path(PathBuf),
    Url(Url),
}

impl ScriptLocation {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        if s.contains("://") {
            Url::parse(s)
                .map(ScriptLocation::Url)
                .map_err(|e| format!("invalid script URL '{}': {}", s, e))
        } else if s.is_empty() {
            Err("empty script location".to_string())
        } else {
            Ok(ScriptLocation::Path(PathBuf::from(s)))
        }
    }

    pub fn resolve_against(self, base: &Path) -> Self {
        match self {
            ScriptLocation::Path(path) if path.is_relative() => {
                ScriptLocation::Path(base.join(path))
            }
            other => other,
        }
    }

    /// Local path to read. Only `file://` URLs are readable.
    pub fn to_path(&self) -> Result<PathBuf> {
        match self {
            ScriptLocation::Path(path) => Ok(path.clone()),
            ScriptLocation::Url(url) if url.scheme() == "file" => {
                url.to_file_path().map_err(|()| FlowError::ScriptIo {
                    location: self.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "URL does not name a local file",
                    ),
                })
            }
            ScriptLocation::Url(url) => Err(FlowError::ScriptIo {
                location: self.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    format!("unsupported URL scheme '{}'", url.scheme()),
                ),
            }),
        }
    }
}

impl From<PathBuf> for ScriptLocation {
    fn from(path: PathBuf) -> Self {
        ScriptLocation::Path(path)
    }
}

impl From<&Path> for ScriptLocation {
    fn from(path: &Path) -> Self {
        ScriptLocation::Path(path.to_path_buf())
    }
}

impl fmt::Display for ScriptLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptLocation::Path(path) => write!(f, "{}", path.display()),
            ScriptLocation::Url(url) => f.write_str(url.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for ScriptLocation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ScriptLocation::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// What a binding names: a live entity, or an id resolved at evaluation time.
#[derive(Clone)]
pub enum BindingTarget {
    Entity(EntityRef),
    Id(String),
}

impl fmt::Debug for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingTarget::Entity(entity) => f.debug_tuple("Entity").field(&entity.id()).finish(),
            BindingTarget::Id(id) => f.debug_tuple("Id").field(id).finish(),
        }
    }
}

impl From<EntityRef> for BindingTarget {
    fn from(entity: EntityRef) -> Self {
        BindingTarget::Entity(entity)
    }
}

impl From<&str> for BindingTarget {
    fn from(id: &str) -> Self {
        BindingTarget::Id(id.to_string())
    }
}

impl<'de> Deserialize<'de> for BindingTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(BindingTarget::Id)
    }
}

//! Entity-owned attribute store.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::watch;

use crate::errors::{FlowError, Result};
use crate::lifecycle::Lifecycle;

/// Boolean "service up" flag, true only while running.
pub const SERVICE_UP: &str = "service.isUp";
/// Lifecycle state in its string form.
pub const SERVICE_STATE: &str = "service.state";

/// Last JSON-representable result of a script evaluation.
pub const SCRIPT_RESULT: &str = "script.result";
/// Branch decision taken by a conditional.
pub const CONDITION_RESULT: &str = "condition.result";
/// Current loop pass, 0-based.
pub const LOOP_ITERATION: &str = "loop.iteration";
/// Child failures swallowed by a loop with `ignore.exceptions`.
pub const LOOP_IGNORED_FAILURES: &str = "loop.ignored_failures";

const RESERVED: [&str; 2] = [SERVICE_UP, SERVICE_STATE];

/// Thread-safe sensor map of a single entity.
///
/// The lifecycle sensors are reserved: only the owning entity's lifecycle
/// helpers write them, and every write is mirrored on a watch channel.
#[derive(Debug)]
pub struct Sensors {
    values: RwLock<HashMap<String, Value>>,
    state_tx: watch::Sender<Option<Lifecycle>>,
}

impl Default for Sensors {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensors {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            state_tx: watch::Sender::new(None),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Read a sensor and deserialize it into `T`; `None` if absent or of another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Set a non-reserved sensor.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if RESERVED.contains(&key) {
            return Err(FlowError::ReservedSensor(key.to_string()));
        }
        self.publish(key, value.into());
        Ok(())
    }

    /// Add `delta` to an integer sensor (missing counts as zero) and return the new value.
    pub fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        if RESERVED.contains(&key) {
            return Err(FlowError::ReservedSensor(key.to_string()));
        }
        let mut values = self.values.write();
        let current = values.get(key).and_then(Value::as_i64).unwrap_or(0);
        let next = current + delta;
        values.insert(key.to_string(), Value::from(next));
        Ok(next)
    }

    pub(crate) fn publish(&self, key: &str, value: Value) {
        self.values.write().insert(key.to_string(), value);
    }

    pub(crate) fn publish_lifecycle(&self, state: Lifecycle) {
        {
            let mut values = self.values.write();
            values.insert(SERVICE_STATE.to_string(), Value::from(state.as_str()));
            values.insert(SERVICE_UP.to_string(), Value::from(state.is_up()));
        }
        self.state_tx.send_replace(Some(state));
    }

    /// Current lifecycle state, `None` before the first start or stop.
    pub fn service_state(&self) -> Option<Lifecycle> {
        *self.state_tx.borrow()
    }

    pub fn is_service_up(&self) -> bool {
        self.get(SERVICE_UP)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<Option<Lifecycle>> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values.read().clone()
    }
}

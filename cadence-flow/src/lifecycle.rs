//! Lifecycle states shared by every managed entity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an entity, published through the `service.state` sensor.
///
/// Transitions within a single start or stop invocation only move forward:
/// `Starting -> Running | OnFire` and `Stopping -> Stopped | OnFire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    Starting,
    Running,
    Stopping,
    Stopped,
    OnFire,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Starting => "starting",
            Lifecycle::Running => "running",
            Lifecycle::Stopping => "stopping",
            Lifecycle::Stopped => "stopped",
            Lifecycle::OnFire => "on-fire",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "starting" => Some(Lifecycle::Starting),
            "running" => Some(Lifecycle::Running),
            "stopping" => Some(Lifecycle::Stopping),
            "stopped" => Some(Lifecycle::Stopped),
            "on-fire" => Some(Lifecycle::OnFire),
            _ => None,
        }
    }

    /// The companion `service.isUp` flag is only ever true while running.
    pub fn is_up(&self) -> bool {
        matches!(self, Lifecycle::Running)
    }

    /// Whether the state settles an invocation (nothing follows it until the
    /// next start or stop).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Lifecycle::Running | Lifecycle::Stopped | Lifecycle::OnFire
        )
    }

    /// Check whether `from -> to` is a legal transition.
    ///
    /// `Starting` and `Stopping` open a new invocation and are reachable from
    /// anywhere (including the initial, unset state). The remaining states can
    /// only close the invocation that the matching entry state opened.
    pub fn allows(from: Option<Lifecycle>, to: Lifecycle) -> bool {
        match to {
            Lifecycle::Starting | Lifecycle::Stopping => true,
            Lifecycle::Running => from == Some(Lifecycle::Starting),
            Lifecycle::Stopped => from == Some(Lifecycle::Stopping),
            Lifecycle::OnFire => matches!(
                from,
                Some(Lifecycle::Starting) | Some(Lifecycle::Stopping)
            ),
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Control flow for managed entity trees.
//!
//! Entities share a lifecycle (`starting`, `running`, `stopping`, `stopped`,
//! `on-fire`) published through their sensors. Control entities decide which
//! of their children to start, and how often, from the result of scripts
//! evaluated against live entity state.

pub mod config;
pub mod context;
pub mod control;
pub mod directory;
pub mod entity;
pub mod errors;
pub mod failure;
pub mod lifecycle;
pub mod script;
pub mod sensors;

pub use context::ExecutionContext;
pub use entity::{BasicEntity, Entity, EntityCore, EntityRef, Location, Startable};
pub use errors::{FlowError, Result};
pub use lifecycle::Lifecycle;

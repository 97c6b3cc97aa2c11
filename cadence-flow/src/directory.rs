//! Lookup of live entities by identifier.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;

use crate::entity::{Entity, EntityRef};
use crate::errors::{FlowError, Result};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no entity with id '{0}'")]
    NotFound(String),

    #[error("lookup cancelled")]
    Cancelled,

    #[error("lookup timed out after {0:?}")]
    TimedOut(Duration),

    #[error("lookup failed: {0}")]
    Failed(String),
}

/// Resolves entity identifiers to live entities.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    async fn lookup(&self, id: &str) -> std::result::Result<EntityRef, LookupError>;
}

/// In-process directory of every entity in a tree.
///
/// Entries are weak: the tree owns its entities, the index only finds them.
#[derive(Default)]
pub struct EntityIndex {
    entries: DashMap<String, Weak<dyn Entity>>,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one entity. An id already held by a live entity is rejected.
    pub fn register(&self, entity: &EntityRef) -> Result<()> {
        let weak = Arc::downgrade(entity);
        match self.entries.entry(entity.id().to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().strong_count() > 0 {
                    return Err(FlowError::Config(format!(
                        "duplicate entity id '{}'",
                        entity.id()
                    )));
                }
                occupied.insert(weak);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(weak);
            }
        }
        Ok(())
    }

    /// Register `root` and all of its descendants.
    pub fn register_tree(&self, root: &EntityRef) -> Result<()> {
        self.register(root)?;
        for child in root.children() {
            self.register_tree(child)?;
        }
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<EntityRef> {
        self.entries.get(id).and_then(|weak| weak.upgrade())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl EntityDirectory for EntityIndex {
    async fn lookup(&self, id: &str) -> std::result::Result<EntityRef, LookupError> {
        self.get(id).ok_or_else(|| LookupError::NotFound(id.to_string()))
    }
}

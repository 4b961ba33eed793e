//! The immutable request describing which entities an operation wants to hold.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// Identifier of a managed entity (node, cluster, storage pool).
pub type EntityId = Uuid;

/// A set of entities to lock, each with the reason it is being locked.
///
/// Entities are kept ordered so conflicts are always reported against the
/// lowest colliding id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppLock {
    locks: BTreeMap<EntityId, String>,
}

impl AppLock {
    /// Build an AppLock from a mapping of entity id to reason.
    pub fn new(locks: impl IntoIterator<Item = (EntityId, String)>) -> Self {
        Self {
            locks: locks.into_iter().collect(),
        }
    }

    /// Lock every entity in `entities` for the same reason.
    pub fn for_entities(entities: impl IntoIterator<Item = EntityId>, reason: &str) -> Self {
        Self::new(entities.into_iter().map(|e| (e, reason.to_string())))
    }

    /// The entity-to-reason mapping.
    pub fn locks(&self) -> &BTreeMap<EntityId, String> {
        &self.locks
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityId> {
        self.locks.keys()
    }

    pub fn reason(&self, entity: &EntityId) -> Option<&str> {
        self.locks.get(entity).map(String::as_str)
    }

    pub fn contains(&self, entity: &EntityId) -> bool {
        self.locks.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl From<HashMap<EntityId, String>> for AppLock {
    fn from(locks: HashMap<EntityId, String>) -> Self {
        Self::new(locks)
    }
}

impl From<BTreeMap<EntityId, String>> for AppLock {
    fn from(locks: BTreeMap<EntityId, String>) -> Self {
        Self { locks }
    }
}

impl<S: Into<String>> FromIterator<(EntityId, S)> for AppLock {
    fn from_iter<I: IntoIterator<Item = (EntityId, S)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(e, r)| (e, r.into())))
    }
}

impl fmt::Display for AppLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .locks
            .iter()
            .map(|(entity, reason)| format!("{} ({})", entity, reason))
            .collect();
        write!(f, "[{}]", entries.join(", "))
    }
}

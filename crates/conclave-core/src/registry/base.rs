//! Base registry trait and implementation.
//!
//! Provides the id-keyed storage shared by `AgentRegistry` and `ToolRegistry`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use conclave_protocols::error::RegistryError;

/// Trait for items that can be stored in a registry.
pub trait Registerable: Send + Sync {
    /// Returns the unique identifier for this item.
    fn registry_id(&self) -> &str;
}

/// Generic registry for managing items by ID.
///
/// Thread-safe storage using DashMap; add and remove are atomic per key.
pub struct BaseRegistry<T: ?Sized + Registerable> {
    items: DashMap<String, Arc<T>>,
}

impl<T: ?Sized + Registerable> BaseRegistry<T> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    /// Register an item.
    ///
    /// Returns an error if an item with the same ID is already registered.
    pub fn register(&self, item: Arc<T>) -> Result<(), RegistryError> {
        let id = item.registry_id().to_string();
        match self.items.entry(id) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyRegistered(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(item);
                Ok(())
            }
        }
    }

    /// Remove an item by ID, returning it.
    pub fn remove(&self, id: &str) -> Option<Arc<T>> {
        self.items.remove(id).map(|(_, item)| item)
    }

    /// Unregister an item by ID.
    pub fn unregister(&self, id: &str) -> Result<(), RegistryError> {
        self.remove(id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Get an item by ID.
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.items.get(id).map(|item| item.clone())
    }

    /// Check if an item with the given ID is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// List all registered item IDs.
    pub fn list_ids(&self) -> Vec<String> {
        self.items.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get the number of registered items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Snapshot of all items.
    ///
    /// Collected so callers never hold a shard guard across an await.
    pub fn values(&self) -> Vec<Arc<T>> {
        self.items.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl<T: ?Sized + Registerable> Default for BaseRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

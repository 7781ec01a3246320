//! In-memory storage implementation.
//!
//! Thread-safe via a tokio `RwLock` over a map of entity type to an ordered map
//! of key to data. Keys are kept in a `BTreeMap`, so listing is ordered by key
//! without sorting. Intended for tests, demos, and services without persistence.

use crate::edm::EntityKey;
use crate::storage::{StorageError, StorageKey, StoragePrefix, StorageProvider};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type EntityTable = BTreeMap<EntityKey, Value>;

/// Thread-safe in-memory storage: `entity_type` → `key` → `data`.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    data: Arc<RwLock<HashMap<String, EntityTable>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get storage statistics for debugging.
    pub async fn stats(&self) -> InMemoryStorageStats {
        let guard = self.data.read().await;
        InMemoryStorageStats {
            entity_type_count: guard.values().filter(|t| !t.is_empty()).count(),
            total_entities: guard.values().map(BTreeMap::len).sum(),
        }
    }

    fn matches(data: &Value, properties: &[(String, Value)]) -> bool {
        properties
            .iter()
            .all(|(name, expected)| data.get(name) == Some(expected))
    }
}

impl StorageProvider for InMemoryStorage {
    type Error = StorageError;

    async fn get(&self, key: StorageKey) -> Result<Option<Value>, Self::Error> {
        let guard = self.data.read().await;
        Ok(guard
            .get(key.entity_type())
            .and_then(|table| table.get(key.key()))
            .cloned())
    }

    async fn create(&self, key: StorageKey, data: Value) -> Result<Value, Self::Error> {
        if !data.is_object() {
            return Err(StorageError::invalid_data("entity data must be a JSON object"));
        }

        // Check and insert under one write guard so concurrent creates cannot both win.
        let mut guard = self.data.write().await;
        let table = guard.entry(key.entity_type().to_string()).or_default();
        if table.contains_key(key.key()) {
            return Err(StorageError::resource_already_exists(
                key.entity_type(),
                key.key(),
            ));
        }
        table.insert(key.key().clone(), data.clone());
        Ok(data)
    }

    async fn update(&self, key: StorageKey, data: Value) -> Result<Value, Self::Error> {
        if !data.is_object() {
            return Err(StorageError::invalid_data("entity data must be a JSON object"));
        }

        let mut guard = self.data.write().await;
        let slot = guard
            .get_mut(key.entity_type())
            .and_then(|table| table.get_mut(key.key()))
            .ok_or_else(|| StorageError::resource_not_found(key.entity_type(), key.key()))?;
        *slot = data.clone();
        Ok(data)
    }

    async fn delete(&self, key: StorageKey) -> Result<bool, Self::Error> {
        let mut guard = self.data.write().await;
        Ok(guard
            .get_mut(key.entity_type())
            .is_some_and(|table| table.remove(key.key()).is_some()))
    }

    async fn conditional_update(
        &self,
        key: StorageKey,
        expected: Value,
        data: Value,
    ) -> Result<Value, Self::Error> {
        if !data.is_object() {
            return Err(StorageError::invalid_data("entity data must be a JSON object"));
        }

        let mut guard = self.data.write().await;
        let slot = guard
            .get_mut(key.entity_type())
            .and_then(|table| table.get_mut(key.key()))
            .ok_or_else(|| StorageError::resource_not_found(key.entity_type(), key.key()))?;
        if *slot != expected {
            return Err(StorageError::precondition_failed(key.entity_type(), key.key()));
        }
        *slot = data.clone();
        Ok(data)
    }

    async fn conditional_delete(&self, key: StorageKey, expected: Value) -> Result<bool, Self::Error> {
        let mut guard = self.data.write().await;
        let Some(table) = guard.get_mut(key.entity_type()) else {
            return Ok(false);
        };
        match table.get(key.key()) {
            None => Ok(false),
            Some(current) if *current != expected => Err(StorageError::precondition_failed(
                key.entity_type(),
                key.key(),
            )),
            Some(_) => Ok(table.remove(key.key()).is_some()),
        }
    }

    async fn list(
        &self,
        prefix: StoragePrefix,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(StorageKey, Value)>, Self::Error> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let guard = self.data.read().await;
        let Some(table) = guard.get(prefix.entity_type()) else {
            return Ok(Vec::new());
        };

        Ok(table
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(key, data)| {
                (
                    StorageKey::new(prefix.entity_type(), key.clone()),
                    data.clone(),
                )
            })
            .collect())
    }

    async fn find_by_properties(
        &self,
        prefix: StoragePrefix,
        properties: &[(String, Value)],
    ) -> Result<Vec<(StorageKey, Value)>, Self::Error> {
        let guard = self.data.read().await;
        let Some(table) = guard.get(prefix.entity_type()) else {
            return Ok(Vec::new());
        };

        Ok(table
            .iter()
            .filter(|(_, data)| Self::matches(data, properties))
            .map(|(key, data)| {
                (
                    StorageKey::new(prefix.entity_type(), key.clone()),
                    data.clone(),
                )
            })
            .collect())
    }

    async fn exists(&self, key: StorageKey) -> Result<bool, Self::Error> {
        let guard = self.data.read().await;
        Ok(guard
            .get(key.entity_type())
            .is_some_and(|table| table.contains_key(key.key())))
    }

    async fn count(&self, prefix: StoragePrefix) -> Result<usize, Self::Error> {
        let guard = self.data.read().await;
        Ok(guard
            .get(prefix.entity_type())
            .map(BTreeMap::len)
            .unwrap_or(0))
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        self.data.write().await.clear();
        Ok(())
    }
}

/// Statistics about the current state of in-memory storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryStorageStats {
    /// Entity types with at least one stored entity
    pub entity_type_count: usize,
    /// Total number of stored entities
    pub total_entities: usize,
}

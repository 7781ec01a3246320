//! Storage abstraction for entity data.
//!
//! Entities are stored as JSON objects under a [`StorageKey`]: the entity type
//! name plus the entity's [`EntityKey`]. Two entities with structurally equal keys
//! in the same entity type are the same stored entity, whichever entity set they
//! were addressed through.
//!
//! The storage layer is responsible for:
//! - Atomic create (collision detection), update, get, and delete of JSON data
//! - Compare-and-write updates and deletes for optimistic concurrency
//! - Ordered listing with pagination
//! - Simple property-equality lookups used for navigation
//!
//! It is NOT responsible for model validation, ETags, or any protocol concern.
//!
//! # Example Usage
//!
//! ```rust
//! use odata_server::edm::{EntityKey, KeyValue};
//! use odata_server::storage::{InMemoryStorage, StorageKey, StorageProvider};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = InMemoryStorage::new();
//! let key = StorageKey::new("ETAllPrim", EntityKey::single("PropertyInt16", KeyValue::Integer(1)));
//!
//! storage.create(key.clone(), json!({"PropertyInt16": 1})).await?;
//! assert!(storage.get(key.clone()).await?.is_some());
//! assert!(storage.delete(key).await?);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;

#[cfg(test)]
mod tests;

pub use errors::StorageError;
pub use in_memory::{InMemoryStorage, InMemoryStorageStats};

use crate::edm::EntityKey;
use crate::error::ODataError;
use serde_json::Value;
use std::fmt;
use std::future::Future;

/// Location of one stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    entity_type: String,
    key: EntityKey,
}

impl StorageKey {
    pub fn new(entity_type: impl Into<String>, key: EntityKey) -> Self {
        Self {
            entity_type: entity_type.into(),
            key,
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Prefix addressing every entity of an entity type.
    pub fn prefix(entity_type: impl Into<String>) -> StoragePrefix {
        StoragePrefix {
            entity_type: entity_type.into(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.entity_type, self.key)
    }
}

/// All entities of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoragePrefix {
    entity_type: String,
}

impl StoragePrefix {
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }
}

impl fmt::Display for StoragePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entity_type)
    }
}

/// Pluggable entity storage.
///
/// Implementations must be safe to share between concurrently executing
/// requests. `create` must be atomic with respect to key collisions: of two
/// concurrent creates with the same key exactly one succeeds.
pub trait StorageProvider: Send + Sync {
    /// The error type returned by storage operations.
    type Error: std::error::Error + Into<ODataError> + Send + Sync + 'static;

    /// Retrieve an entity.
    ///
    /// Returns `None` if nothing is stored under the key.
    fn get(
        &self,
        key: StorageKey,
    ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send;

    /// Store a new entity and return the stored data.
    ///
    /// Fails with a "resource already exists" error if the key is taken.
    fn create(
        &self,
        key: StorageKey,
        data: Value,
    ) -> impl Future<Output = Result<Value, Self::Error>> + Send;

    /// Replace an existing entity and return the stored data.
    ///
    /// Fails with a "resource not found" error if the key is free.
    fn update(
        &self,
        key: StorageKey,
        data: Value,
    ) -> impl Future<Output = Result<Value, Self::Error>> + Send;

    /// Delete an entity.
    ///
    /// Returns `true` if an entity was removed, `false` if none existed.
    fn delete(&self, key: StorageKey) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Replace an entity only while its stored data still equals `expected`.
    ///
    /// The comparison and the write are one atomic step. Fails with "resource
    /// not found" if the key is free and with "precondition failed" if the
    /// stored data differs.
    fn conditional_update(
        &self,
        key: StorageKey,
        expected: Value,
        data: Value,
    ) -> impl Future<Output = Result<Value, Self::Error>> + Send;

    /// Delete an entity only while its stored data still equals `expected`.
    ///
    /// Returns `false` if none existed; fails with "precondition failed" if
    /// the stored data differs.
    fn conditional_delete(
        &self,
        key: StorageKey,
        expected: Value,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// List entities of a type ordered by key, with pagination.
    ///
    /// An `offset` past the end or a `limit` of 0 yields an empty vector.
    fn list(
        &self,
        prefix: StoragePrefix,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<(StorageKey, Value)>, Self::Error>> + Send;

    /// Entities whose top-level properties equal every given `(name, value)` pair,
    /// ordered by key.
    fn find_by_properties(
        &self,
        prefix: StoragePrefix,
        properties: &[(String, Value)],
    ) -> impl Future<Output = Result<Vec<(StorageKey, Value)>, Self::Error>> + Send;

    fn exists(&self, key: StorageKey) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Number of entities stored for a type.
    fn count(
        &self,
        prefix: StoragePrefix,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    /// Remove all data.
    fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

//! Parameterized tests for storage providers.
//!
//! `test_storage_provider` runs the full suite against any implementation.

use super::{InMemoryStorage, StorageError, StorageKey, StorageProvider};
use crate::edm::{EntityKey, KeyValue};
use serde_json::json;
use std::sync::Arc;

fn int_key(entity_type: &str, id: i64) -> StorageKey {
    StorageKey::new(
        entity_type,
        EntityKey::single("PropertyInt16", KeyValue::Integer(id)),
    )
}

fn message_key(from: &str, id: i64) -> StorageKey {
    StorageKey::new(
        "Message",
        EntityKey::new(vec![
            ("FromUsername".into(), KeyValue::String(from.into())),
            ("MessageId".into(), KeyValue::Integer(id)),
        ]),
    )
}

/// Test suite for any StorageProvider implementation.
pub async fn test_storage_provider<S>(storage: S)
where
    S: StorageProvider<Error = StorageError>,
{
    test_create_and_get(&storage).await;
    test_create_collision(&storage).await;
    test_update_requires_existing(&storage).await;
    test_delete(&storage).await;
    test_conditional_writes(&storage).await;
    test_list_ordered_with_pagination(&storage).await;
    test_find_by_properties(&storage).await;
    test_count_and_type_isolation(&storage).await;
    test_composite_key_recreate(&storage).await;
}

async fn test_create_and_get<S>(storage: &S)
where
    S: StorageProvider<Error = StorageError>,
{
    storage.clear().await.unwrap();
    let key = int_key("ETAllPrim", 32767);
    let data = json!({"PropertyInt16": 32767, "PropertyString": "First Resource"});

    let stored = storage.create(key.clone(), data.clone()).await.unwrap();
    assert_eq!(stored, data);
    assert_eq!(storage.get(key.clone()).await.unwrap(), Some(data));
    assert!(storage.exists(key).await.unwrap());
    assert!(storage.get(int_key("ETAllPrim", 1)).await.unwrap().is_none());
}

async fn test_create_collision<S>(storage: &S)
where
    S: StorageProvider<Error = StorageError>,
{
    storage.clear().await.unwrap();
    let key = int_key("ETAllPrim", 1);
    storage.create(key.clone(), json!({"PropertyInt16": 1})).await.unwrap();

    let err = storage
        .create(key.clone(), json!({"PropertyInt16": 1, "PropertyString": "x"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ResourceAlreadyExists { .. }));
    assert_eq!(
        storage.get(key).await.unwrap(),
        Some(json!({"PropertyInt16": 1}))
    );
}

async fn test_update_requires_existing<S>(storage: &S)
where
    S: StorageProvider<Error = StorageError>,
{
    storage.clear().await.unwrap();
    let key = int_key("ETAllPrim", 2);

    let err = storage
        .update(key.clone(), json!({"PropertyInt16": 2}))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ResourceNotFound { .. }));

    storage.create(key.clone(), json!({"PropertyInt16": 2})).await.unwrap();
    storage
        .update(key.clone(), json!({"PropertyInt16": 2, "PropertyString": "new"}))
        .await
        .unwrap();
    assert_eq!(
        storage.get(key).await.unwrap().unwrap()["PropertyString"],
        "new"
    );
}

async fn test_delete<S>(storage: &S)
where
    S: StorageProvider<Error = StorageError>,
{
    storage.clear().await.unwrap();
    let key = int_key("ETAllPrim", 3);
    storage.create(key.clone(), json!({"PropertyInt16": 3})).await.unwrap();

    assert!(storage.delete(key.clone()).await.unwrap());
    assert!(storage.get(key.clone()).await.unwrap().is_none());
    assert!(!storage.delete(key).await.unwrap());
}

async fn test_conditional_writes<S>(storage: &S)
where
    S: StorageProvider<Error = StorageError>,
{
    storage.clear().await.unwrap();
    let key = int_key("ETAllPrim", 4);
    let original = json!({"PropertyInt16": 4, "PropertyString": "original"});

    let err = storage
        .conditional_update(key.clone(), original.clone(), original.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ResourceNotFound { .. }));

    storage.create(key.clone(), original.clone()).await.unwrap();
    let first = json!({"PropertyInt16": 4, "PropertyString": "first"});
    storage
        .conditional_update(key.clone(), original.clone(), first.clone())
        .await
        .unwrap();

    // a second writer still holding the original data loses
    let err = storage
        .conditional_update(key.clone(), original.clone(), json!({"PropertyInt16": 4}))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::PreconditionFailed { .. }));
    let err = storage
        .conditional_delete(key.clone(), original)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::PreconditionFailed { .. }));
    assert_eq!(storage.get(key.clone()).await.unwrap(), Some(first.clone()));

    assert!(storage.conditional_delete(key.clone(), first.clone()).await.unwrap());
    assert!(!storage.conditional_delete(key, first).await.unwrap());
}

async fn test_list_ordered_with_pagination<S>(storage: &S)
where
    S: StorageProvider<Error = StorageError>,
{
    storage.clear().await.unwrap();
    for id in [5, -3, 12, 0, 7] {
        storage
            .create(int_key("ETAllPrim", id), json!({"PropertyInt16": id}))
            .await
            .unwrap();
    }

    let prefix = StorageKey::prefix("ETAllPrim");
    let all = storage.list(prefix.clone(), 0, usize::MAX).await.unwrap();
    let ids: Vec<i64> = all
        .iter()
        .map(|(_, data)| data["PropertyInt16"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![-3, 0, 5, 7, 12]);

    let page = storage.list(prefix.clone(), 1, 2).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].1["PropertyInt16"], 0);

    assert!(storage.list(prefix.clone(), 10, 5).await.unwrap().is_empty());
    assert!(storage.list(prefix, 0, 0).await.unwrap().is_empty());
}

async fn test_find_by_properties<S>(storage: &S)
where
    S: StorageProvider<Error = StorageError>,
{
    storage.clear().await.unwrap();
    for (id, customer) in [(1, 10), (2, 11), (3, 10)] {
        storage
            .create(
                int_key("Order", id),
                json!({"PropertyInt16": id, "CustomerId": customer}),
            )
            .await
            .unwrap();
    }

    let found = storage
        .find_by_properties(
            StorageKey::prefix("Order"),
            &[("CustomerId".to_string(), json!(10))],
        )
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().map(|(_, d)| d["PropertyInt16"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(3)]);

    let none = storage
        .find_by_properties(
            StorageKey::prefix("Missing"),
            &[("CustomerId".to_string(), json!(10))],
        )
        .await
        .unwrap();
    assert!(none.is_empty());
}

async fn test_count_and_type_isolation<S>(storage: &S)
where
    S: StorageProvider<Error = StorageError>,
{
    storage.clear().await.unwrap();
    storage.create(int_key("A", 1), json!({"PropertyInt16": 1})).await.unwrap();
    storage.create(int_key("B", 1), json!({"PropertyInt16": 1})).await.unwrap();
    storage.create(int_key("B", 2), json!({"PropertyInt16": 2})).await.unwrap();

    assert_eq!(storage.count(StorageKey::prefix("A")).await.unwrap(), 1);
    assert_eq!(storage.count(StorageKey::prefix("B")).await.unwrap(), 2);
    assert_eq!(storage.count(StorageKey::prefix("C")).await.unwrap(), 0);

    storage.delete(int_key("A", 1)).await.unwrap();
    assert!(storage.exists(int_key("B", 1)).await.unwrap());
}

async fn test_composite_key_recreate<S>(storage: &S)
where
    S: StorageProvider<Error = StorageError>,
{
    storage.clear().await.unwrap();
    let key = message_key("fromusername", 100);
    let data = json!({"FromUsername": "fromusername", "MessageId": 100});

    storage.create(key.clone(), data.clone()).await.unwrap();
    assert!(storage.delete(key.clone()).await.unwrap());
    assert!(storage.get(key.clone()).await.unwrap().is_none());
    storage.create(key.clone(), data.clone()).await.unwrap();
    assert_eq!(storage.get(key).await.unwrap(), Some(data));
}

#[tokio::test]
async fn test_in_memory_storage() {
    test_storage_provider(InMemoryStorage::new()).await;
}

#[tokio::test]
async fn test_in_memory_stats() {
    let storage = InMemoryStorage::new();
    storage.create(int_key("A", 1), json!({})).await.unwrap();
    storage.create(int_key("B", 1), json!({})).await.unwrap();
    storage.delete(int_key("A", 1)).await.unwrap();

    let stats = storage.stats().await;
    assert_eq!(stats.entity_type_count, 1);
    assert_eq!(stats.total_entities, 1);
}

#[tokio::test]
async fn test_create_rejects_non_object() {
    let storage = InMemoryStorage::new();
    let err = storage.create(int_key("A", 1), json!([1, 2])).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidData { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_single_winner() {
    let storage = Arc::new(InMemoryStorage::new());
    let key = message_key("race", 1);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let storage = storage.clone();
            let key = key.clone();
            tokio::spawn(async move { storage.create(key, json!({"attempt": i})).await })
        })
        .collect();

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(StorageError::ResourceAlreadyExists { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_conditional_updates_single_winner() {
    let storage = Arc::new(InMemoryStorage::new());
    let key = int_key("ETAllPrim", 1);
    let original = json!({"PropertyInt16": 1, "PropertyString": "original"});
    storage.create(key.clone(), original.clone()).await.unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let storage = storage.clone();
            let key = key.clone();
            let original = original.clone();
            tokio::spawn(async move {
                storage
                    .conditional_update(key, original, json!({"PropertyInt16": 1, "PropertyString": i}))
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    let mut stale = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(StorageError::PreconditionFailed { .. }) => stale += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(stale, 15);
}

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use tracing::trace;

use crate::ListResult;
use crate::StorageBackend;
use crate::StorageError;

#[derive(Debug, Default)]
struct ItemMap {
    revision: u64,
    items: BTreeMap<String, Value>,
}

type ReadPoisonError<'a> = PoisonError<RwLockReadGuard<'a, ItemMap>>;

impl<'a> From<ReadPoisonError<'a>> for StorageError {
    fn from(_error: ReadPoisonError) -> Self {
        Self::LockPoisoned
    }
}

type WritePoisonError<'a> = PoisonError<RwLockWriteGuard<'a, ItemMap>>;

impl<'a> From<WritePoisonError<'a>> for StorageError {
    fn from(_error: WritePoisonError) -> Self {
        Self::LockPoisoned
    }
}

fn resource_version(value: &Value) -> &str {
    value
        .get("metadata")
        .and_then(|meta| meta.get("resourceVersion"))
        .and_then(|version| version.as_str())
        .unwrap_or("")
}

/// stamp new revision into metadata.resourceVersion
fn stamp(key: &str, value: &mut Value, revision: u64) -> Result<(), StorageError> {
    match value.get_mut("metadata").and_then(|meta| meta.as_object_mut()) {
        Some(meta) => {
            meta.insert(
                "resourceVersion".to_owned(),
                Value::String(revision.to_string()),
            );
            Ok(())
        }
        None => Err(StorageError::InvalidObject {
            key: key.to_owned(),
            reason: "object does not have metadata".to_owned(),
        }),
    }
}

/// Backend keeping every value in process memory.
/// Cloning shares the same underlying items.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    store: Arc<RwLock<ItemMap>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// number of stored items
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.store.read()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn create(&self, key: &str, mut value: Value) -> Result<Value, StorageError> {
        let mut store = self.store.write()?;
        if store.items.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_owned()));
        }
        let revision = store.revision + 1;
        stamp(key, &mut value, revision)?;
        store.revision = revision;
        store.items.insert(key.to_owned(), value.clone());
        debug!(key, revision, "created");
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Value, StorageError> {
        let store = self.store.read()?;
        store
            .items
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_owned()))
    }

    async fn list(&self, prefix: &str) -> Result<ListResult, StorageError> {
        let store = self.store.read()?;
        let items: Vec<Value> = store
            .items
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| value.clone())
            .collect();
        trace!(prefix, count = items.len(), "listed");
        Ok(ListResult {
            items,
            resource_version: store.revision.to_string(),
        })
    }

    async fn update(
        &self,
        key: &str,
        precondition: Option<&str>,
        mut value: Value,
    ) -> Result<Value, StorageError> {
        let mut store = self.store.write()?;
        let revision = store.revision + 1;
        let existing = store
            .items
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(key.to_owned()))?;

        if let Some(expected) = precondition {
            let actual = resource_version(existing);
            if actual != expected {
                return Err(StorageError::Conflict {
                    key: key.to_owned(),
                    expected: expected.to_owned(),
                    actual: actual.to_owned(),
                });
            }
        }

        stamp(key, &mut value, revision)?;
        *existing = value.clone();
        store.revision = revision;
        debug!(key, revision, "updated");
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<Value, StorageError> {
        let mut store = self.store.write()?;
        let value = store
            .items
            .remove(key)
            .ok_or_else(|| StorageError::NotFound(key.to_owned()))?;
        debug!(key, "deleted");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {

    use serde_json::json;

    use super::InMemoryStorage;
    use crate::StorageBackend;
    use crate::StorageError;

    fn new_service(name: &str) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": name,
                "namespace": "default",
                "labels": { "app": "spu" }
            },
            "spec": { "clusterIP": "None" }
        })
    }

    #[fluvio_future::test]
    async fn test_create_and_delete_service() {
        let client = InMemoryStorage::new();
        let item = client
            .create("/registry/services/default/test", new_service("test"))
            .await
            .expect("service should be created");
        assert_eq!(item["metadata"]["resourceVersion"], "1");

        let deleted = client
            .delete("/registry/services/default/test")
            .await
            .expect("delete should work");
        assert_eq!(deleted, item);
        assert!(client.is_empty().expect("len"));

        let err = client
            .delete("/registry/services/default/test")
            .await
            .expect_err("already deleted");
        assert!(err.is_not_found());
    }

    #[fluvio_future::test]
    async fn test_create_and_retrieve_service() {
        let client = InMemoryStorage::new();
        let item = client
            .create("/registry/services/default/test", new_service("test"))
            .await
            .expect("service should be created");

        let retrieved = client
            .get("/registry/services/default/test")
            .await
            .expect("retrieve should work");
        assert_eq!(retrieved, item);

        let err = client
            .create("/registry/services/default/test", new_service("test"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[fluvio_future::test]
    async fn test_conditional_update() {
        let client = InMemoryStorage::new();
        let key = "/registry/services/default/test";
        client.create(key, new_service("test")).await.expect("create");

        let mut next = new_service("test");
        next["spec"]["clusterIP"] = json!("10.0.0.1");
        let updated = client
            .update(key, Some("1"), next.clone())
            .await
            .expect("update");
        assert_eq!(updated["metadata"]["resourceVersion"], "2");
        assert_eq!(updated["spec"]["clusterIP"], "10.0.0.1");

        // stale version
        let err = client
            .update(key, Some("1"), next.clone())
            .await
            .expect_err("conflict");
        assert!(err.is_conflict());

        // unconditional
        let updated = client.update(key, None, next).await.expect("update");
        assert_eq!(updated["metadata"]["resourceVersion"], "3");
    }

    #[fluvio_future::test]
    async fn test_list_by_prefix() {
        let client = InMemoryStorage::new();
        client
            .create("/registry/services/default/a", new_service("a"))
            .await
            .expect("create");
        client
            .create("/registry/services/other/b", new_service("b"))
            .await
            .expect("create");
        client
            .create("/registry/servicesx/default/c", new_service("c"))
            .await
            .expect("create");

        let all = client.list("/registry/services/").await.expect("list");
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.resource_version, "3");

        let default_ns = client
            .list("/registry/services/default/")
            .await
            .expect("list");
        assert_eq!(default_ns.items.len(), 1);
        assert_eq!(default_ns.items[0]["metadata"]["name"], "a");
    }

    #[fluvio_future::test]
    async fn test_reject_value_without_metadata() {
        let client = InMemoryStorage::new();
        let err = client
            .create("/registry/x", json!({ "spec": {} }))
            .await
            .expect_err("no metadata");
        assert!(matches!(err, StorageError::InvalidObject { .. }));
        assert!(!client.exists("/registry/x").await.expect("exists"));
    }
}

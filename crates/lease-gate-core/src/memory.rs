use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::GateError;
use crate::ops::StoreOpener;
use crate::store::ObjectStore;

/// In-memory object store.
///
/// Backs unit and integration tests, and is handy for trying the protocol
/// out locally without a bucket. Listing order is deterministic (sorted by
/// key).
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, GateError> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), GateError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, GateError> {
        Ok(self.objects.lock().unwrap().remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, GateError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Opener that resolves every container name to one shared [`MemoryStore`].
pub struct MemoryOpener {
    store: Arc<MemoryStore>,
}

impl MemoryOpener {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StoreOpener for MemoryOpener {
    async fn open(&self, _container: &str) -> Result<Arc<dyn ObjectStore>, GateError> {
        Ok(Arc::clone(&self.store) as Arc<dyn ObjectStore>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_put_delete() {
        let store = MemoryStore::new();

        assert!(store.get("a").await.unwrap().is_none());

        store.put("a", b"1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_prefix() {
        let store = MemoryStore::new();
        store.put("locks/1", b"{}").await.unwrap();
        store.put("locks/2", b"{}").await.unwrap();
        store.put("counter.json", b"{}").await.unwrap();

        let keys = store.list("locks/").await.unwrap();
        assert_eq!(keys, vec!["locks/1".to_string(), "locks/2".to_string()]);
    }
}

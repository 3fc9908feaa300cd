use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::storage::types::{KeyValueIndex, StorageDriver, USER_PREFIX};

type Entries = Arc<Mutex<HashMap<String, String>>>;

/// Process-local driver. Blobs and every index share one map behind one lock,
/// so each primitive is atomic with respect to all others.
#[derive(Clone, Default)]
pub struct InMemoryDriver {
    entry: Entries,
}

/// Index handle into an [`InMemoryDriver`].
#[derive(Clone)]
pub struct InMemoryIndex {
    name: String,
    entry: Entries,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory user storage driver");
        Self::default()
    }

    fn make_key(prefix: &str, key: &str) -> String {
        format!("{prefix}:{key}")
    }
}

impl InMemoryIndex {
    fn make_key(&self, key: &str) -> String {
        InMemoryDriver::make_key(&self.name, key)
    }
}

#[async_trait]
impl StorageDriver for InMemoryDriver {
    type Index = InMemoryIndex;

    async fn set(&self, primary_key: &str, value: &str) -> Result<(), StorageError> {
        let key = Self::make_key(USER_PREFIX, primary_key);
        self.entry.lock().await.insert(key, value.to_string());
        Ok(())
    }

    async fn lookup(&self, primary_key: &str) -> Result<Option<String>, StorageError> {
        let key = Self::make_key(USER_PREFIX, primary_key);
        Ok(self.entry.lock().await.get(&key).cloned())
    }

    async fn delete(&self, primary_key: &str) -> Result<(), StorageError> {
        let key = Self::make_key(USER_PREFIX, primary_key);
        self.entry.lock().await.remove(&key);
        Ok(())
    }

    fn index(&self, name: &str) -> Self::Index {
        InMemoryIndex {
            name: name.to_string(),
            entry: Arc::clone(&self.entry),
        }
    }
}

#[async_trait]
impl KeyValueIndex for InMemoryIndex {
    async fn put(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        let key = self.make_key(key);
        self.entry.lock().await.insert(key, user_id.to_string());
        Ok(())
    }

    async fn claim(&self, key: &str, user_id: &str) -> Result<bool, StorageError> {
        let key = self.make_key(key);
        let mut entry = self.entry.lock().await;
        match entry.get(&key) {
            Some(owner) => Ok(owner == user_id),
            None => {
                entry.insert(key, user_id.to_string());
                Ok(true)
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let key = self.make_key(key);
        self.entry.lock().await.remove(&key);
        Ok(())
    }

    async fn release(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        let key = self.make_key(key);
        let mut entry = self.entry.lock().await;
        if entry.get(&key).is_some_and(|owner| owner == user_id) {
            entry.remove(&key);
        }
        Ok(())
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = self.make_key(key);
        Ok(self.entry.lock().await.get(&key).cloned())
    }
}

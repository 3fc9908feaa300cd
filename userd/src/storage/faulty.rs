//! In-memory driver that fails or interferes on demand.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::storage::errors::StorageError;
use crate::storage::memory::{InMemoryDriver, InMemoryIndex};
use crate::storage::types::{KeyValueIndex, StorageDriver};

#[derive(Debug, Default)]
pub(crate) struct Faults {
    pub(crate) fail_set: AtomicBool,
    pub(crate) fail_release: AtomicBool,
    /// `(index, key, owner)` forced into an index right after the next blob write
    pub(crate) overwrite_after_set: Mutex<Option<(String, String, String)>>,
}

#[derive(Clone, Default)]
pub(crate) struct FaultyDriver {
    inner: InMemoryDriver,
    faults: Arc<Faults>,
}

#[derive(Clone)]
pub(crate) struct FaultyIndex {
    inner: InMemoryIndex,
    faults: Arc<Faults>,
}

impl FaultyDriver {
    pub(crate) fn faults(&self) -> &Faults {
        &self.faults
    }

    pub(crate) fn fail_set(&self, on: bool) {
        self.faults.fail_set.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_release(&self, on: bool) {
        self.faults.fail_release.store(on, Ordering::SeqCst);
    }
}

fn injected(op: &str) -> StorageError {
    StorageError::Storage(format!("injected {op} failure"))
}

#[async_trait]
impl StorageDriver for FaultyDriver {
    type Index = FaultyIndex;

    async fn set(&self, primary_key: &str, value: &str) -> Result<(), StorageError> {
        if self.faults.fail_set.load(Ordering::SeqCst) {
            return Err(injected("set"));
        }
        self.inner.set(primary_key, value).await?;
        let overwrite = self
            .faults
            .overwrite_after_set
            .lock()
            .map_err(|_| injected("lock"))?
            .take();
        if let Some((index, key, owner)) = overwrite {
            self.inner.index(&index).put(&key, &owner).await?;
        }
        Ok(())
    }

    async fn lookup(&self, primary_key: &str) -> Result<Option<String>, StorageError> {
        self.inner.lookup(primary_key).await
    }

    async fn delete(&self, primary_key: &str) -> Result<(), StorageError> {
        self.inner.delete(primary_key).await
    }

    fn index(&self, name: &str) -> Self::Index {
        FaultyIndex {
            inner: self.inner.index(name),
            faults: Arc::clone(&self.faults),
        }
    }
}

#[async_trait]
impl KeyValueIndex for FaultyIndex {
    async fn put(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        self.inner.put(key, user_id).await
    }

    async fn claim(&self, key: &str, user_id: &str) -> Result<bool, StorageError> {
        self.inner.claim(key, user_id).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }

    async fn release(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        if self.faults.fail_release.load(Ordering::SeqCst) {
            return Err(injected("release"));
        }
        self.inner.release(key, user_id).await
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.lookup(key).await
    }
}

use async_trait::async_trait;

use crate::storage::errors::StorageError;
use crate::storage::etcd::{EtcdConfig, EtcdDriver, EtcdIndex};
use crate::storage::memory::{InMemoryDriver, InMemoryIndex};
use crate::storage::redis::{RedisDriver, RedisIndex};
use crate::storage::types::{KeyValueIndex, StorageDriver};

/// Which physical store to use, chosen once at startup.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Memory,
    Redis { url: String },
    Etcd(EtcdConfig),
}

/// One of the supported drivers.
#[derive(Clone)]
pub enum Backend {
    Memory(InMemoryDriver),
    Redis(RedisDriver),
    Etcd(EtcdDriver),
}

/// Index handle of whichever driver a [`Backend`] holds.
#[derive(Clone)]
pub enum BackendIndex {
    Memory(InMemoryIndex),
    Redis(RedisIndex),
    Etcd(EtcdIndex),
}

impl Backend {
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        tracing::info!(storage = config.kind(), "Initializing user storage backend");

        let backend = match config {
            StorageConfig::Memory => Self::Memory(InMemoryDriver::new()),
            StorageConfig::Redis { url } => Self::Redis(RedisDriver::connect(url).await?),
            StorageConfig::Etcd(etcd) => Self::Etcd(EtcdDriver::connect(etcd.clone()).await?),
        };
        Ok(backend)
    }
}

impl StorageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis { .. } => "redis",
            Self::Etcd(_) => "etcd",
        }
    }
}

#[async_trait]
impl StorageDriver for Backend {
    type Index = BackendIndex;

    async fn set(&self, primary_key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(driver) => driver.set(primary_key, value).await,
            Self::Redis(driver) => driver.set(primary_key, value).await,
            Self::Etcd(driver) => driver.set(primary_key, value).await,
        }
    }

    async fn lookup(&self, primary_key: &str) -> Result<Option<String>, StorageError> {
        match self {
            Self::Memory(driver) => driver.lookup(primary_key).await,
            Self::Redis(driver) => driver.lookup(primary_key).await,
            Self::Etcd(driver) => driver.lookup(primary_key).await,
        }
    }

    async fn delete(&self, primary_key: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(driver) => driver.delete(primary_key).await,
            Self::Redis(driver) => driver.delete(primary_key).await,
            Self::Etcd(driver) => driver.delete(primary_key).await,
        }
    }

    fn index(&self, name: &str) -> Self::Index {
        match self {
            Self::Memory(driver) => BackendIndex::Memory(driver.index(name)),
            Self::Redis(driver) => BackendIndex::Redis(driver.index(name)),
            Self::Etcd(driver) => BackendIndex::Etcd(driver.index(name)),
        }
    }
}

#[async_trait]
impl KeyValueIndex for BackendIndex {
    async fn put(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(index) => index.put(key, user_id).await,
            Self::Redis(index) => index.put(key, user_id).await,
            Self::Etcd(index) => index.put(key, user_id).await,
        }
    }

    async fn claim(&self, key: &str, user_id: &str) -> Result<bool, StorageError> {
        match self {
            Self::Memory(index) => index.claim(key, user_id).await,
            Self::Redis(index) => index.claim(key, user_id).await,
            Self::Etcd(index) => index.claim(key, user_id).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(index) => index.remove(key).await,
            Self::Redis(index) => index.remove(key).await,
            Self::Etcd(index) => index.remove(key).await,
        }
    }

    async fn release(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(index) => index.release(key, user_id).await,
            Self::Redis(index) => index.release(key, user_id).await,
            Self::Etcd(index) => index.release(key, user_id).await,
        }
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            Self::Memory(index) => index.lookup(key).await,
            Self::Redis(index) => index.lookup(key).await,
            Self::Etcd(index) => index.lookup(key).await,
        }
    }
}

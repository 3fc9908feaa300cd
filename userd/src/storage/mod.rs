mod backend;
mod errors;
mod etcd;
#[cfg(test)]
mod faulty;
mod memory;
mod redis;
mod types;

pub use backend::{Backend, BackendIndex, StorageConfig};
pub use errors::StorageError;
pub use etcd::{EtcdConfig, EtcdDriver, EtcdIndex};
pub use memory::{InMemoryDriver, InMemoryIndex};
#[cfg(test)]
pub(crate) use faulty::FaultyDriver;
pub use self::redis::{RedisDriver, RedisIndex};
pub use types::{
    INDEX_EMAILS, INDEX_LOGIN_NAME, INDEX_RESET_PASSWORD_TOKEN, KeyValueIndex, StorageDriver,
};

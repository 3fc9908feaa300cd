use async_trait::async_trait;
use redis::{self, AsyncCommands, aio::MultiplexedConnection};
use std::sync::LazyLock;

use crate::storage::errors::StorageError;
use crate::storage::types::{KeyValueIndex, StorageDriver, USER_PREFIX};

// Redis runs a script without interleaving other commands, which makes the
// read-compare-write below a single atomic step.
static CLAIM_SCRIPT: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
local current = redis.call('GET', KEYS[1])
if not current then
    redis.call('SET', KEYS[1], ARGV[1])
    return 1
end
if current == ARGV[1] then
    return 1
end
return 0
",
    )
});

static RELEASE_SCRIPT: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
",
    )
});

/// Driver storing blobs as `user:<id>` and index entries as `<index>:<key>`.
#[derive(Clone)]
pub struct RedisDriver {
    conn: MultiplexedConnection,
}

/// Index handle into a [`RedisDriver`].
#[derive(Clone)]
pub struct RedisIndex {
    name: String,
    conn: MultiplexedConnection,
}

impl RedisDriver {
    /// Open a client for `url` and verify the server answers.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!("Connected to redis user storage");
        Ok(Self { conn })
    }

    fn make_key(prefix: &str, key: &str) -> String {
        format!("{prefix}:{key}")
    }
}

impl RedisIndex {
    fn make_key(&self, key: &str) -> String {
        RedisDriver::make_key(&self.name, key)
    }
}

#[async_trait]
impl StorageDriver for RedisDriver {
    type Index = RedisIndex;

    async fn set(&self, primary_key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let key = Self::make_key(USER_PREFIX, primary_key);
        let _: () = conn.set(&key, value).await?;
        Ok(())
    }

    async fn lookup(&self, primary_key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.conn.clone();
        let key = Self::make_key(USER_PREFIX, primary_key);
        let value: Option<String> = conn.get(&key).await?;
        Ok(value)
    }

    async fn delete(&self, primary_key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let key = Self::make_key(USER_PREFIX, primary_key);
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    fn index(&self, name: &str) -> Self::Index {
        RedisIndex {
            name: name.to_string(),
            conn: self.conn.clone(),
        }
    }
}

#[async_trait]
impl KeyValueIndex for RedisIndex {
    async fn put(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let key = self.make_key(key);
        let _: () = conn.set(&key, user_id).await?;
        Ok(())
    }

    async fn claim(&self, key: &str, user_id: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn.clone();
        let key = self.make_key(key);
        let claimed: i64 = CLAIM_SCRIPT
            .key(&key)
            .arg(user_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(claimed == 1)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let key = self.make_key(key);
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    async fn release(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let key = self.make_key(key);
        let _: i64 = RELEASE_SCRIPT
            .key(&key)
            .arg(user_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.conn.clone();
        let key = self.make_key(key);
        let value: Option<String> = conn.get(&key).await?;
        Ok(value)
    }
}

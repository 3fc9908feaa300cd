use redis::{AsyncCommands, aio::MultiplexedConnection};

use super::{EventStream, with_prefix};
use crate::storage::StorageError;

/// Pushes events to Redis, either onto a list (`RPUSH`) or to a pub/sub
/// channel (`PUBLISH`) named `<prefix>.<tag>`.
#[derive(Clone)]
pub struct RedisEventStream {
    conn: MultiplexedConnection,
    prefix: String,
    use_publish: bool,
}

impl RedisEventStream {
    pub async fn connect(
        url: &str,
        prefix: impl Into<String>,
        use_publish: bool,
    ) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            prefix: prefix.into(),
            use_publish,
        })
    }
}

impl EventStream for RedisEventStream {
    fn publish(&self, tag: &str, payload: &[u8]) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(tag, "No tokio runtime, dropping event");
            return;
        };

        let mut conn = self.conn.clone();
        let channel = with_prefix(&self.prefix, tag);
        let message = String::from_utf8_lossy(payload).into_owned();
        let use_publish = self.use_publish;

        runtime.spawn(async move {
            let result: redis::RedisResult<i64> = if use_publish {
                conn.publish(&channel, &message).await
            } else {
                conn.rpush(&channel, &message).await
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, channel = %channel, "Failed to publish event to redis");
            }
        });
    }
}

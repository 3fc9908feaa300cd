use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

use crate::storage::errors::StorageError;
use crate::storage::types::{KeyValueIndex, StorageDriver, USER_PREFIX};

/// Connection settings for [`EtcdDriver`].
#[derive(Debug, Clone)]
pub struct EtcdConfig {
    /// Base URL of the etcd v3 JSON gateway, e.g. `http://localhost:2379`
    pub endpoint: String,
    /// Key prefix under which all userd keys live
    pub prefix: String,
    /// Lease attached to each user blob write, if any
    pub ttl: Option<Duration>,
}

/// Driver speaking the etcd v3 JSON gateway.
///
/// Keys are `<prefix>/user/<id>` for blobs and `<prefix>/<index>/<key>` for
/// index entries. Conditional index writes are etcd transactions.
#[derive(Clone)]
pub struct EtcdDriver {
    client: EtcdClient,
    ttl: Option<Duration>,
}

/// Index handle into an [`EtcdDriver`].
#[derive(Clone)]
pub struct EtcdIndex {
    name: String,
    client: EtcdClient,
}

#[derive(Clone)]
struct EtcdClient {
    http: reqwest::Client,
    endpoint: String,
    prefix: String,
}

#[derive(Debug, Default, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    #[serde(default)]
    value: String,
    /// Lease id, absent when the key has none
    #[serde(default)]
    lease: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    #[serde(default)]
    prev_kv: Option<KeyValue>,
}

#[derive(Debug, Deserialize)]
struct TxnResponse {
    #[serde(default)]
    succeeded: bool,
    #[serde(default)]
    responses: Vec<ResponseOp>,
}

#[derive(Debug, Deserialize)]
struct ResponseOp {
    #[serde(default)]
    response_range: Option<RangeResponse>,
}

#[derive(Debug, Deserialize)]
struct LeaseGrantResponse {
    #[serde(rename = "ID")]
    id: String,
}

fn encode(raw: &str) -> String {
    STANDARD.encode(raw.as_bytes())
}

fn decode(encoded: &str) -> Result<String, StorageError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| StorageError::UnexpectedResponse(format!("invalid base64 value: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| StorageError::UnexpectedResponse(format!("value is not utf-8: {e}")))
}

impl RangeResponse {
    fn first_value(&self) -> Result<Option<String>, StorageError> {
        self.kvs.first().map(|kv| decode(&kv.value)).transpose()
    }
}

impl PutResponse {
    /// Lease the overwritten key was attached to, other than `current`.
    fn superseded_lease(&self, current: &str) -> Option<&str> {
        self.prev_kv
            .as_ref()
            .and_then(|kv| kv.lease.as_deref())
            .filter(|lease| !lease.is_empty() && *lease != "0" && *lease != current)
    }
}

impl TxnResponse {
    /// Value carried by the first range response of a failed transaction.
    fn range_value(&self) -> Result<Option<String>, StorageError> {
        match self
            .responses
            .iter()
            .find_map(|op| op.response_range.as_ref())
        {
            Some(range) => range.first_value(),
            None => Ok(None),
        }
    }
}

impl EtcdClient {
    fn make_key(&self, namespace: &str, key: &str) -> String {
        format!("{}/{namespace}/{key}", self.prefix)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, StorageError> {
        let url = format!("{}{path}", self.endpoint);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn range(&self, key: &str) -> Result<Option<String>, StorageError> {
        let response: RangeResponse = self
            .post("/v3/kv/range", json!({ "key": encode(key) }))
            .await?;
        response.first_value()
    }

    async fn put(&self, key: &str, value: &str, lease: Option<&str>) -> Result<(), StorageError> {
        let mut body = json!({ "key": encode(key), "value": encode(value) });
        if let Some(lease) = lease {
            body["lease"] = json!(lease);
        }
        let _: Value = self.post("/v3/kv/put", body).await?;
        Ok(())
    }

    /// Put `value` under a lease and return the overwritten key's state.
    async fn put_leased(
        &self,
        key: &str,
        value: &str,
        lease: &str,
    ) -> Result<PutResponse, StorageError> {
        self.post(
            "/v3/kv/put",
            json!({ "key": encode(key), "value": encode(value), "lease": lease, "prev_kv": true }),
        )
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let _: Value = self
            .post("/v3/kv/deleterange", json!({ "key": encode(key) }))
            .await?;
        Ok(())
    }

    async fn grant_lease(&self, ttl: Duration) -> Result<String, StorageError> {
        let response: LeaseGrantResponse = self
            .post(
                "/v3/lease/grant",
                json!({ "TTL": ttl.as_secs().max(1), "ID": 0 }),
            )
            .await?;
        Ok(response.id)
    }

    async fn revoke_lease(&self, id: &str) -> Result<(), StorageError> {
        let _: Value = self.post("/v3/lease/revoke", json!({ "ID": id })).await?;
        Ok(())
    }

    async fn txn(&self, body: Value) -> Result<TxnResponse, StorageError> {
        self.post("/v3/kv/txn", body).await
    }
}

fn create_if_absent_txn(key: &str, value: &str) -> Value {
    let key = encode(key);
    json!({
        "compare": [{ "key": key, "result": "EQUAL", "target": "CREATE", "create_revision": "0" }],
        "success": [{ "request_put": { "key": key, "value": encode(value) } }],
        "failure": [{ "request_range": { "key": key } }],
    })
}

fn delete_if_value_txn(key: &str, value: &str) -> Value {
    let key = encode(key);
    json!({
        "compare": [{ "key": key, "result": "EQUAL", "target": "VALUE", "value": encode(value) }],
        "success": [{ "request_delete_range": { "key": key } }],
    })
}

impl EtcdDriver {
    /// Build a driver for `config` and verify the gateway answers.
    pub async fn connect(config: EtcdConfig) -> Result<Self, StorageError> {
        let driver = Self::new(config);
        let _: Value = driver
            .client
            .post("/v3/maintenance/status", json!({}))
            .await?;
        tracing::info!(endpoint = %driver.client.endpoint, "Connected to etcd user storage");
        Ok(driver)
    }

    fn new(config: EtcdConfig) -> Self {
        Self {
            client: EtcdClient {
                http: reqwest::Client::new(),
                endpoint: config.endpoint.trim_end_matches('/').to_string(),
                prefix: config.prefix.trim_end_matches('/').to_string(),
            },
            ttl: config.ttl,
        }
    }
}

#[async_trait]
impl StorageDriver for EtcdDriver {
    type Index = EtcdIndex;

    async fn set(&self, primary_key: &str, value: &str) -> Result<(), StorageError> {
        let key = self.client.make_key(USER_PREFIX, primary_key);
        let Some(ttl) = self.ttl else {
            return self.client.put(&key, value, None).await;
        };
        let lease = self.client.grant_lease(ttl).await?;
        let response = self.client.put_leased(&key, value, &lease).await?;
        // The old lease now holds no keys, so revoking it deletes nothing
        if let Some(previous) = response.superseded_lease(&lease) {
            if let Err(e) = self.client.revoke_lease(previous).await {
                tracing::warn!(error = %e, lease = previous, "Failed to revoke superseded lease");
            }
        }
        Ok(())
    }

    async fn lookup(&self, primary_key: &str) -> Result<Option<String>, StorageError> {
        let key = self.client.make_key(USER_PREFIX, primary_key);
        self.client.range(&key).await
    }

    async fn delete(&self, primary_key: &str) -> Result<(), StorageError> {
        let key = self.client.make_key(USER_PREFIX, primary_key);
        self.client.delete(&key).await
    }

    fn index(&self, name: &str) -> Self::Index {
        EtcdIndex {
            name: name.to_string(),
            client: self.client.clone(),
        }
    }
}

#[async_trait]
impl KeyValueIndex for EtcdIndex {
    async fn put(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        let key = self.client.make_key(&self.name, key);
        self.client.put(&key, user_id, None).await
    }

    async fn claim(&self, key: &str, user_id: &str) -> Result<bool, StorageError> {
        let key = self.client.make_key(&self.name, key);
        let response = self.client.txn(create_if_absent_txn(&key, user_id)).await?;
        if response.succeeded {
            return Ok(true);
        }
        Ok(response.range_value()?.as_deref() == Some(user_id))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let key = self.client.make_key(&self.name, key);
        self.client.delete(&key).await
    }

    async fn release(&self, key: &str, user_id: &str) -> Result<(), StorageError> {
        let key = self.client.make_key(&self.name, key);
        self.client.txn(delete_if_value_txn(&key, user_id)).await?;
        Ok(())
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = self.client.make_key(&self.name, key);
        self.client.range(&key).await
    }
}

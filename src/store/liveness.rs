//! The liveness KV store contract: `Put`, `GetAll`, `Del` against a keyed
//! store of `{hostname -> {last-refresh, ports}}`. Values are encoded as
//! JSON within a single hash field, mirroring the `{dns: {last-update,
//! ports}}` shape.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("liveness entry not found for {0:?}")]
    NotFound(String),
    #[error("liveness store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessEntry {
    pub last_refresh: i64,
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DnsValue {
    dns: LivenessEntry,
}

#[async_trait]
pub trait LivenessStore: Send + Sync {
    async fn put(&self, key: &str, entry: LivenessEntry) -> Result<(), StoreError>;
    async fn get_all(&self) -> Result<HashMap<String, LivenessEntry>, StoreError>;
    async fn del(&self, key: &str) -> Result<(), StoreError>;
}

/// Redis-backed liveness store: one hash key per host, a single `dns` field
/// holding the JSON-encoded entry.
pub struct RedisLivenessStore {
    manager: redis::aio::ConnectionManager,
    key_prefix: String,
}

impl RedisLivenessStore {
    pub async fn connect(addr: &str, key_prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(addr).map_err(|e| StoreError::Backend(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self {
            manager,
            key_prefix: key_prefix.into(),
        })
    }

    fn redis_key(&self, host: &str) -> String {
        format!("{}:{}", self.key_prefix, host)
    }
}

#[async_trait]
impl LivenessStore for RedisLivenessStore {
    async fn put(&self, key: &str, entry: LivenessEntry) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let encoded = serde_json::to_string(&DnsValue { dns: entry }).map_err(|e| StoreError::Backend(e.to_string()))?;
        redis::cmd("HSET")
            .arg(self.redis_key(key))
            .arg("dns")
            .arg(encoded)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_all(&self) -> Result<HashMap<String, LivenessEntry>, StoreError> {
        let mut conn = self.manager.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{}:*", self.key_prefix))
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = redis::cmd("HGET")
                .arg(&key)
                .arg("dns")
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let Some(raw) = raw else { continue };
            let value: DnsValue = serde_json::from_str(&raw).map_err(|e| StoreError::Backend(e.to_string()))?;
            let host = key
                .strip_prefix(&format!("{}:", self.key_prefix))
                .unwrap_or(&key)
                .to_string();
            out.insert(host, value.dns);
        }
        Ok(out)
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(self.redis_key(key))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

/// In-process fake for tests: an ordinary mutex-guarded map. Enumeration
/// order follows the map's own iteration order, matching the "no ordering
/// guarantee across calls" contract.
#[derive(Default)]
pub struct InMemoryLivenessStore {
    entries: Mutex<HashMap<String, LivenessEntry>>,
}

#[async_trait]
impl LivenessStore for InMemoryLivenessStore {
    async fn put(&self, key: &str, entry: LivenessEntry) -> Result<(), StoreError> {
        self.entries.lock().unwrap().insert(key.to_string(), entry);
        Ok(())
    }

    async fn get_all(&self) -> Result<HashMap<String, LivenessEntry>, StoreError> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        match self.entries.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }
}

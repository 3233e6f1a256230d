//! Redis-backed implementation of the core [`Cache`] contract, plus an
//! in-memory stand-in used by tests. Callers treat cache failures as misses;
//! nothing in here is authoritative.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use tokio::sync::RwLock;

use bastion_core::contracts::Cache;
use bastion_core::CoreError;

pub struct RedisCacheService {
  conn: Arc<RwLock<MultiplexedConnection>>,
  prefix: String,
}

impl RedisCacheService {
  pub async fn new(url: &str, prefix: &str) -> Result<Self, CoreError> {
    let client = Client::open(url).map_err(|e| CoreError::Internal(e.to_string()))?;
    let conn = client
      .get_multiplexed_async_connection()
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;

    Ok(Self {
      conn: Arc::new(RwLock::new(conn)),
      prefix: prefix.to_string(),
    })
  }

  fn make_key(&self, key: &str) -> String {
    format!("{}:{}", self.prefix, key)
  }
}

fn cache_err(e: redis::RedisError) -> CoreError {
  CoreError::Internal(format!("cache error: {}", e))
}

#[async_trait]
impl Cache for RedisCacheService {
  async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
    let mut conn = self.conn.write().await;
    let full_key = self.make_key(key);
    let data: Option<Vec<u8>> = conn.get(&full_key).await.map_err(cache_err)?;
    Ok(data)
  }

  async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<(), CoreError> {
    let mut conn = self.conn.write().await;
    let full_key = self.make_key(key);
    conn
      .set_ex::<_, _, ()>(&full_key, value, ttl_secs)
      .await
      .map_err(cache_err)?;
    Ok(())
  }

  async fn del(&self, key: &str) -> Result<bool, CoreError> {
    let mut conn = self.conn.write().await;
    let full_key = self.make_key(key);
    let deleted: bool = conn.del(&full_key).await.map_err(cache_err)?;
    Ok(deleted)
  }

  async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, CoreError> {
    let mut conn = self.conn.write().await;
    let full_key = self.make_key(key);
    let value: i64 = conn.incr(&full_key, 1).await.map_err(cache_err)?;
    if value == 1 {
      conn
        .expire::<_, ()>(&full_key, ttl_secs as i64)
        .await
        .map_err(cache_err)?;
    }
    Ok(value)
  }
}

/// Serialize-through helpers shared by the stores
pub async fn cache_get_json<T: serde::de::DeserializeOwned>(
  cache: &dyn Cache,
  key: &str,
) -> Option<T> {
  match cache.get_bytes(key).await {
    Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
    Ok(None) => None,
    Err(e) => {
      tracing::warn!("cache read failed for {}: {}", key, e);
      None
    }
  }
}

pub async fn cache_set_json<T: serde::Serialize>(
  cache: &dyn Cache,
  key: &str,
  value: &T,
  ttl_secs: u64,
) {
  let Ok(bytes) = serde_json::to_vec(value) else {
    return;
  };
  if let Err(e) = cache.set_bytes(key, bytes, ttl_secs).await {
    tracing::warn!("cache write failed for {}: {}", key, e);
  }
}

pub async fn cache_del(cache: &dyn Cache, key: &str) {
  if let Err(e) = cache.del(key).await {
    tracing::warn!("cache eviction failed for {}: {}", key, e);
  }
}

/// In-memory cache used by unit tests; supports TTL coarsely (entries never
/// expire mid-test) and the same contract as redis.
#[cfg(test)]
pub mod memory {
  use super::*;
  use std::collections::HashMap;
  use std::sync::Mutex;

  #[derive(Default)]
  pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    counters: Mutex<HashMap<String, i64>>,
  }

  impl MemoryCache {
    pub fn new() -> Self {
      Self::default()
    }
  }

  #[async_trait]
  impl Cache for MemoryCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
      Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, _ttl_secs: u64) -> Result<(), CoreError> {
      self.entries.lock().unwrap().insert(key.to_string(), value);
      Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, CoreError> {
      let removed_entry = self.entries.lock().unwrap().remove(key).is_some();
      let removed_counter = self.counters.lock().unwrap().remove(key).is_some();
      Ok(removed_entry || removed_counter)
    }

    async fn incr(&self, key: &str, _ttl_secs: u64) -> Result<i64, CoreError> {
      let mut counters = self.counters.lock().unwrap();
      let value = counters.entry(key.to_string()).or_insert(0);
      *value += 1;
      Ok(*value)
    }
  }
}

//! Key-value backing store for the draft cache.
//!
//! Backed by Redis in production and an in-memory map in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

// ---------------------------------------------------------------------------
// Redis implementation
// ---------------------------------------------------------------------------

pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!("redis connection manager created");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let val: Option<String> = conn.get(key).await?;
        Ok(val)
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

// Lets the host process pick a backend at startup (Redis, or memory when
// Redis is unreachable) behind one concrete cache type.
#[async_trait]
impl CacheStore for Box<dyn CacheStore> {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        (**self).set_ex(key, value, ttl_secs).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key).await
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        (**self).del(key).await
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (tests)
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<(), CacheError> {
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.data.lock().get(key).cloned())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.data.lock().remove(key);
        Ok(())
    }
}

//! Key-value transport under the repositories.
//!
//! Each persisted collection is one JSON document stored under a single
//! key. [`InMemoryStore`] is the in-process cache, [`RedisStore`] the
//! network store.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, Client};
use service_core::error::AppError;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: String) -> Result<(), AppError>;
    /// Short label used in logs and metrics.
    fn name(&self) -> &'static str;
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Redis-backed store. The connection is opened on first use so that an
/// unreachable server degrades reads instead of failing startup.
pub struct RedisStore {
    client: Client,
    manager: OnceCell<ConnectionManager>,
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self, AppError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, AppError> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                tracing::info!("Connecting to Redis");
                self.client.get_connection_manager().await.map_err(|e| {
                    tracing::error!("Failed to get Redis connection manager: {}", e);
                    AppError::from(e)
                })
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// src/persistence/redis_store.rs
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::debug;

use super::{PersistenceAdapter, StorageKeys};
use crate::error::AdmissionError;
use crate::models::Resource;

/// Redis-backed persistence for stored pools.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self, AdmissionError> {
        let client = Client::open(redis_url)
            .map_err(|e| AdmissionError::Persistence(e.to_string()))?;
        let manager = ConnectionManager::new(client).await?;

        // Test connection
        let mut conn = manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self { manager })
    }
}

#[async_trait]
impl PersistenceAdapter for RedisStore {
    async fn load_resource(
        &self,
        tenant: &str,
        id: &str,
    ) -> Result<Option<Resource>, AdmissionError> {
        let key = StorageKeys::resource(tenant, id);
        let mut conn = self.manager.clone();
        debug!("Redis GET: {}", key);
        let raw: Option<String> = conn.get(&key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save_resource(&self, resource: &Resource) -> Result<(), AdmissionError> {
        let key = StorageKeys::resource(&resource.tenant, &resource.id);
        let raw = serde_json::to_string(resource)?;
        let mut conn = self.manager.clone();
        debug!("Redis SET: {}", key);
        let _: () = conn.set(&key, raw).await?;
        Ok(())
    }
}

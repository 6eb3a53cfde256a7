// src/persistence/mod.rs
pub mod memory_store;
pub mod redis_store;

pub use memory_store::InMemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;

use crate::error::AdmissionError;
use crate::models::Resource;

/// Helper for generating consistent storage keys
pub struct StorageKeys;

impl StorageKeys {
    /// Key for a pool's live state: `admission:resource:{tenant}:{id}`
    pub fn resource(tenant: &str, id: &str) -> String {
        format!("admission:resource:{}:{}", tenant, id)
    }
}

/// Durable key/value store for the live state of pools marked `stored`.
///
/// Absence is an empty result, not an error; durability is best-effort and
/// the in-memory ledger stays authoritative between saves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    async fn load_resource(
        &self,
        tenant: &str,
        id: &str,
    ) -> Result<Option<Resource>, AdmissionError>;

    async fn save_resource(&self, resource: &Resource) -> Result<(), AdmissionError>;
}

// src/persistence/memory_store.rs
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{PersistenceAdapter, StorageKeys};
use crate::error::AdmissionError;
use crate::models::Resource;

/// Process-local store. Used in tests and in deployments without a Redis
/// endpoint, where stored pools only survive as long as the process.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryStore {
    async fn load_resource(
        &self,
        tenant: &str,
        id: &str,
    ) -> Result<Option<Resource>, AdmissionError> {
        let entries = self.entries.read().await;
        match entries.get(&StorageKeys::resource(tenant, id)) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    async fn save_resource(&self, resource: &Resource) -> Result<(), AdmissionError> {
        let raw = serde_json::to_string(resource)?;
        let mut entries = self.entries.write().await;
        entries.insert(StorageKeys::resource(&resource.tenant, &resource.id), raw);
        Ok(())
    }
}

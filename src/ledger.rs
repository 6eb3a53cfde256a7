// src/ledger.rs
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::Resource;

/// Process-wide table of live pool state, keyed by `tenant:id`.
///
/// Exclusively owned by the admission engine; entries are created lazily on
/// first reservation attempt and live for the lifetime of the pool. The
/// table hands out shared handles, but mutation of a `Resource` only
/// happens while the engine holds that pool's named lock.
#[derive(Default)]
pub struct UsageLedger {
    entries: RwLock<HashMap<String, Arc<RwLock<Resource>>>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tenant: &str, id: &str) -> String {
        format!("{}:{}", tenant, id)
    }

    /// Handle for a pool's state, creating an empty entry when absent.
    pub async fn entry(&self, tenant: &str, id: &str) -> Arc<RwLock<Resource>> {
        let key = Self::key(tenant, id);
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                return entry.clone();
            }
        }
        let mut entries = self.entries.write().await;
        entries
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(Resource::new(tenant, id))))
            .clone()
    }

    /// Handle for a pool's state, without creating one.
    pub async fn get(&self, tenant: &str, id: &str) -> Option<Arc<RwLock<Resource>>> {
        let entries = self.entries.read().await;
        entries.get(&Self::key(tenant, id)).cloned()
    }

    /// Whether an entry exists for the pool.
    pub async fn contains(&self, tenant: &str, id: &str) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(&Self::key(tenant, id))
    }

    /// Installs state restored from the persistence adapter.
    pub async fn insert(&self, resource: Resource) -> Arc<RwLock<Resource>> {
        let key = Self::key(&resource.tenant, &resource.id);
        let entry = Arc::new(RwLock::new(resource));
        let mut entries = self.entries.write().await;
        entries.insert(key, entry.clone());
        entry
    }

    /// `(tenant, id)` pairs of every tracked pool; used by the background
    /// expiry sweep.
    pub async fn tracked(&self) -> Vec<(String, String)> {
        let entries = self.entries.read().await;
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries.values() {
            let res = entry.read().await;
            out.push((res.tenant.clone(), res.id.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_entry_creation() {
        let ledger = UsageLedger::new();
        assert!(!ledger.contains("cgrates.org", "RL1").await);

        let entry = ledger.entry("cgrates.org", "RL1").await;
        assert_eq!(entry.read().await.id, "RL1");
        assert!(ledger.contains("cgrates.org", "RL1").await);

        // same handle on repeat access
        let again = ledger.entry("cgrates.org", "RL1").await;
        assert!(Arc::ptr_eq(&entry, &again));
    }

    #[tokio::test]
    async fn test_insert_restored_state() {
        let ledger = UsageLedger::new();
        let res = Resource::new("cgrates.org", "RL1");
        ledger.insert(res).await;
        assert!(ledger.get("cgrates.org", "RL1").await.is_some());
        assert_eq!(ledger.tracked().await.len(), 1);
    }
}

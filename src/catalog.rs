// src/catalog.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AdmissionError;
use crate::models::ResourcePool;

/// Read side of the profile catalog: supplies the candidate pool list for a
/// tenant. The catalog's own storage, versioning and CRUD API live outside
/// this service; pools are read-only snapshots here.
#[async_trait]
pub trait ProfileCatalog: Send + Sync {
    /// All pools configured for the tenant, in a stable catalog order.
    /// `NotFound` when the tenant has none.
    async fn pools_for_tenant(&self, tenant: &str)
        -> Result<Vec<Arc<ResourcePool>>, AdmissionError>;

    /// Tenants currently present in the catalog; used to warm up stored
    /// pools before accepting traffic.
    async fn tenants(&self) -> Result<Vec<String>, AdmissionError>;
}

/// In-memory catalog. Pool order per tenant is insertion order, which makes
/// the weight tie-break deterministic.
#[derive(Default)]
pub struct InMemoryCatalog {
    pools: RwLock<HashMap<String, Vec<Arc<ResourcePool>>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a pool, keeping its position on replace.
    pub async fn set_pool(&self, pool: ResourcePool) {
        let mut pools = self.pools.write().await;
        let tenant_pools = pools.entry(pool.tenant.clone()).or_default();
        match tenant_pools.iter().position(|p| p.id == pool.id) {
            Some(idx) => tenant_pools[idx] = Arc::new(pool),
            None => tenant_pools.push(Arc::new(pool)),
        }
    }

    pub async fn remove_pool(&self, tenant: &str, id: &str) {
        let mut pools = self.pools.write().await;
        if let Some(tenant_pools) = pools.get_mut(tenant) {
            tenant_pools.retain(|p| p.id != id);
        }
    }
}

#[async_trait]
impl ProfileCatalog for InMemoryCatalog {
    async fn pools_for_tenant(
        &self,
        tenant: &str,
    ) -> Result<Vec<Arc<ResourcePool>>, AdmissionError> {
        let pools = self.pools.read().await;
        match pools.get(tenant) {
            Some(tenant_pools) if !tenant_pools.is_empty() => Ok(tenant_pools.clone()),
            _ => Err(AdmissionError::NotFound(format!(
                "no resource pools configured for tenant: {}",
                tenant
            ))),
        }
    }

    async fn tenants(&self) -> Result<Vec<String>, AdmissionError> {
        let pools = self.pools.read().await;
        Ok(pools.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(id: &str, weight: f64) -> ResourcePool {
        ResourcePool {
            tenant: "cgrates.org".to_string(),
            id: id.to_string(),
            filter_ids: vec![],
            activation_interval: None,
            usage_ttl_secs: -1,
            limit: 10.0,
            allocation_message: String::new(),
            blocker: false,
            stored: false,
            weight,
            threshold_ids: vec![],
        }
    }

    #[tokio::test]
    async fn test_unknown_tenant_is_not_found() {
        let catalog = InMemoryCatalog::new();
        let err = catalog.pools_for_tenant("cgrates.org").await.unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_set_pool_preserves_order_on_replace() {
        let catalog = InMemoryCatalog::new();
        catalog.set_pool(pool("RL1", 10.0)).await;
        catalog.set_pool(pool("RL2", 20.0)).await;
        catalog.set_pool(pool("RL1", 15.0)).await; // replace in place

        let pools = catalog.pools_for_tenant("cgrates.org").await.unwrap();
        let ids: Vec<&str> = pools.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["RL1", "RL2"]);
        assert_eq!(pools[0].weight, 15.0);
    }

    #[tokio::test]
    async fn test_remove_pool() {
        let catalog = InMemoryCatalog::new();
        catalog.set_pool(pool("RL1", 10.0)).await;
        catalog.remove_pool("cgrates.org", "RL1").await;
        assert!(catalog.pools_for_tenant("cgrates.org").await.is_err());
    }
}

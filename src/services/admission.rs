// src/services/admission.rs
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::catalog::ProfileCatalog;
use crate::error::AdmissionError;
use crate::filters::FilterEvaluator;
use crate::ledger::UsageLedger;
use crate::lock::{resource_lock_key, LockManager};
use crate::models::{Event, Resource, ResourcePool, ResourceUsage};
use crate::observer::{ObserverHook, EVENT_ALLOCATE, EVENT_RELEASE};
use crate::persistence::PersistenceAdapter;
use crate::services::selector::{BlockerPolicy, PoolSelector};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Upper bound on waiting for a pool's lock.
    pub lock_timeout: StdDuration,
    /// -1 saves stored pools write-through under the pool lock, 0 disables
    /// saving, >0 marks resources dirty for the periodic backup loop.
    pub store_interval_secs: i64,
    pub blocker_policy: BlockerPolicy,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            lock_timeout: StdDuration::from_secs(5),
            store_interval_secs: -1,
            blocker_policy: BlockerPolicy::OnMatch,
        }
    }
}

/// The admission engine: walks the ordered candidate pools for an event and
/// authorizes, commits or releases reservations against their live state.
pub struct AdmissionService {
    selector: PoolSelector,
    catalog: Arc<dyn ProfileCatalog>,
    ledger: UsageLedger,
    locks: LockManager,
    store: Arc<dyn PersistenceAdapter>,
    observer: Option<ObserverHook>,
    config: AdmissionConfig,
    /// Pools with unsaved changes, drained by the backup loop.
    dirty: Mutex<HashSet<(String, String)>>,
}

impl AdmissionService {
    pub fn new(
        catalog: Arc<dyn ProfileCatalog>,
        filters: Arc<dyn FilterEvaluator>,
        store: Arc<dyn PersistenceAdapter>,
        observer: Option<ObserverHook>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            selector: PoolSelector::new(catalog.clone(), filters, config.blocker_policy),
            catalog,
            ledger: UsageLedger::new(),
            locks: LockManager::new(),
            store,
            observer,
            config,
            dirty: Mutex::new(HashSet::new()),
        }
    }

    /// Loads the last-known state of every stored pool before the service
    /// accepts traffic. Usages already past their expiry are swept on load,
    /// so a restart cannot resurrect stale reservations.
    pub async fn warm_up(&self) -> Result<(), AdmissionError> {
        let mut restored = 0usize;
        for tenant in self.catalog.tenants().await? {
            let pools = match self.catalog.pools_for_tenant(&tenant).await {
                Ok(pools) => pools,
                Err(AdmissionError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            for pool in pools.iter().filter(|p| p.stored) {
                let key = resource_lock_key(&pool.tenant, &pool.id);
                let _guard = self.locks.acquire(&key, self.config.lock_timeout).await?;
                self.entry_for(pool).await;
                restored += 1;
            }
        }
        info!(restored, "stored pool state loaded");
        Ok(())
    }

    /// Handle for a pool's live state, restoring it from the persistence
    /// adapter on first access of a stored pool. Callers that intend to
    /// mutate must hold the pool's named lock.
    async fn entry_for(&self, pool: &ResourcePool) -> Arc<RwLock<Resource>> {
        if let Some(entry) = self.ledger.get(&pool.tenant, &pool.id).await {
            return entry;
        }
        if pool.stored {
            match self.store.load_resource(&pool.tenant, &pool.id).await {
                Ok(Some(mut restored)) => {
                    restored.remove_expired(Utc::now());
                    restored.dirty = false;
                    return self.ledger.insert(restored).await;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        tenant = %pool.tenant,
                        pool = %pool.id,
                        error = %e,
                        "failed loading stored resource, starting empty"
                    );
                }
            }
        }
        self.ledger.entry(&pool.tenant, &pool.id).await
    }

    /// Read-only runtime state of every pool matching the event, expired
    /// usages filtered out. No mutation, no reservation.
    pub async fn resources_for_event(
        &self,
        tenant: &str,
        event: &Event,
        usage_ttl_override: Option<i64>,
    ) -> Result<Vec<Resource>, AdmissionError> {
        let now = Utc::now();
        let matched = self
            .selector
            .select(tenant, event, usage_ttl_override, now)
            .await?;
        let mut out = Vec::with_capacity(matched.len());
        for m in &matched {
            out.push(self.snapshot_for(&m.profile, now).await?);
        }
        Ok(out)
    }

    /// Runtime state of a single pool by id.
    pub async fn resource(&self, tenant: &str, id: &str) -> Result<Resource, AdmissionError> {
        let pools = self.catalog.pools_for_tenant(tenant).await?;
        let pool = pools
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AdmissionError::NotFound(format!("resource pool: {}:{}", tenant, id)))?;
        self.snapshot_for(pool, Utc::now()).await
    }

    async fn snapshot_for(
        &self,
        pool: &ResourcePool,
        now: DateTime<Utc>,
    ) -> Result<Resource, AdmissionError> {
        if let Some(entry) = self.ledger.get(&pool.tenant, &pool.id).await {
            return Ok(entry.read().await.live_snapshot(now));
        }
        // not yet tracked: a stored pool may still have state on disk
        if pool.stored {
            if let Some(restored) = self.store.load_resource(&pool.tenant, &pool.id).await? {
                return Ok(restored.live_snapshot(now));
            }
        }
        Ok(Resource::new(&pool.tenant, &pool.id))
    }

    /// Dry-run capacity check. Walks the candidate pools in weight order
    /// and reports the allocation message of the first pool that could
    /// satisfy the request, without reserving anything.
    pub async fn authorize(
        &self,
        tenant: &str,
        event: &Event,
        usage_id: &str,
        units: f64,
        usage_ttl_override: Option<i64>,
    ) -> Result<String, AdmissionError> {
        validate_usage_id(usage_id)?;
        let now = Utc::now();
        let matched = self
            .selector
            .select(tenant, event, usage_ttl_override, now)
            .await?;

        for m in &matched {
            let key = resource_lock_key(&m.profile.tenant, &m.profile.id);
            let _guard = self.locks.acquire(&key, self.config.lock_timeout).await?;
            let entry = self.entry_for(&m.profile).await;
            let mut res = entry.write().await;
            res.remove_expired(now);
            if m.profile.is_unlimited() || m.profile.limit >= res.total_usage() + units {
                return Ok(m.profile.grant_message().to_string());
            }
        }
        Err(AdmissionError::ResourceUnauthorized)
    }

    /// Commits a reservation on the first candidate pool with room. The
    /// whole walk either records exactly one usage or mutates nothing.
    pub async fn allocate(
        &self,
        tenant: &str,
        event: &Event,
        usage_id: &str,
        units: f64,
        usage_ttl_override: Option<i64>,
    ) -> Result<String, AdmissionError> {
        validate_usage_id(usage_id)?;
        let now = Utc::now();
        let matched = self
            .selector
            .select(tenant, event, usage_ttl_override, now)
            .await?;

        for m in &matched {
            let key = resource_lock_key(&m.profile.tenant, &m.profile.id);
            let guard = self.locks.acquire(&key, self.config.lock_timeout).await?;
            let entry = self.entry_for(&m.profile).await;
            let mut res = entry.write().await;
            res.remove_expired(now);

            // a live reservation under the same correlation id rejects the
            // whole operation; falling through to another pool would grant
            // capacity twice for one retried request
            if res.has_live_usage(usage_id, now) {
                return Err(AdmissionError::DuplicateUsage(format!(
                    "{}:{}",
                    tenant, usage_id
                )));
            }

            if !m.profile.is_unlimited() && m.profile.limit < res.total_usage() + units {
                continue; // overflow to the next candidate
            }

            let recorded = res.record_usage(
                ResourceUsage {
                    tenant: tenant.to_string(),
                    id: usage_id.to_string(),
                    expiry_time: None,
                    units,
                },
                m.effective_ttl,
                now,
            )?;
            let total = res.total_usage();
            self.persist_after_change(&m.profile, &mut res).await;
            drop(res);
            drop(guard);

            info!(
                tenant,
                pool = %m.profile.id,
                usage_id,
                units,
                total,
                "resource allocated"
            );
            self.notify(EVENT_ALLOCATE, &m.profile, recorded, total);
            return Ok(m.profile.grant_message().to_string());
        }
        Err(AdmissionError::ResourceUnavailable)
    }

    /// Removes the usage from every matching pool currently holding it.
    pub async fn release(
        &self,
        tenant: &str,
        event: &Event,
        usage_id: &str,
        usage_ttl_override: Option<i64>,
    ) -> Result<(), AdmissionError> {
        validate_usage_id(usage_id)?;
        let now = Utc::now();
        let matched = self
            .selector
            .select(tenant, event, usage_ttl_override, now)
            .await?;

        let mut found = false;
        for m in &matched {
            let key = resource_lock_key(&m.profile.tenant, &m.profile.id);
            let guard = self.locks.acquire(&key, self.config.lock_timeout).await?;
            let entry = self.entry_for(&m.profile).await;
            let mut res = entry.write().await;
            res.remove_expired(now);
            let cleared = match res.clear_usage(usage_id) {
                Ok(usage) => usage,
                Err(AdmissionError::UsageNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            found = true;
            let total = res.total_usage();
            self.persist_after_change(&m.profile, &mut res).await;
            drop(res);
            drop(guard);

            info!(
                tenant,
                pool = %m.profile.id,
                usage_id,
                units = cleared.units,
                total,
                "resource released"
            );
            self.notify(EVENT_RELEASE, &m.profile, cleared, total);
        }

        if !found {
            return Err(AdmissionError::UsageNotFound(usage_id.to_string()));
        }
        Ok(())
    }

    /// One pass of the background expiry sweep over every tracked pool,
    /// taking each pool's lock before mutating. Returns swept entries.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut swept_total = 0usize;
        for (tenant, id) in self.ledger.tracked().await {
            let key = resource_lock_key(&tenant, &id);
            let guard = match self.locks.acquire(&key, self.config.lock_timeout).await {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(%tenant, pool = %id, error = %e, "sweep skipping busy pool");
                    continue;
                }
            };
            let Some(entry) = self.ledger.get(&tenant, &id).await else {
                continue;
            };
            let mut res = entry.write().await;
            let swept = res.remove_expired(now);
            if swept > 0 {
                swept_total += swept;
                if let Some(pool) = self.pool_by_id(&tenant, &id).await {
                    self.persist_after_change(&pool, &mut res).await;
                }
            }
            drop(res);
            drop(guard);
        }
        swept_total
    }

    async fn pool_by_id(&self, tenant: &str, id: &str) -> Option<Arc<ResourcePool>> {
        match self.catalog.pools_for_tenant(tenant).await {
            Ok(pools) => pools.iter().find(|p| p.id == id).cloned(),
            Err(_) => None,
        }
    }

    /// Applies the configured durability mode after an in-memory change.
    /// A failed save is logged and retried by the backup loop; the
    /// in-memory state stays authoritative either way.
    async fn persist_after_change(&self, pool: &ResourcePool, res: &mut Resource) {
        if !pool.stored {
            res.dirty = false;
            return;
        }
        match self.config.store_interval_secs {
            secs if secs < 0 => {
                // write-through under the pool lock
                match self.store.save_resource(res).await {
                    Ok(()) => res.dirty = false,
                    Err(e) => {
                        error!(
                            tenant = %res.tenant,
                            pool = %res.id,
                            error = %e,
                            "failed saving resource, in-memory state remains authoritative"
                        );
                        let mut dirty = self.dirty.lock().await;
                        dirty.insert((res.tenant.clone(), res.id.clone()));
                    }
                }
            }
            0 => {} // saving disabled
            _ => {
                res.dirty = true;
                let mut dirty = self.dirty.lock().await;
                dirty.insert((res.tenant.clone(), res.id.clone()));
            }
        }
    }

    /// Saves every resource marked dirty; one complete backup task.
    /// Failures are rescheduled for the next run.
    pub async fn store_dirty(&self) {
        let mut failed: Vec<(String, String)> = Vec::new();
        loop {
            let next = {
                let mut dirty = self.dirty.lock().await;
                let next = dirty.iter().next().cloned();
                if let Some(key) = &next {
                    dirty.remove(key);
                }
                next
            };
            let Some((tenant, id)) = next else {
                break; // no more keys, backup completed
            };
            let Some(entry) = self.ledger.get(&tenant, &id).await else {
                continue;
            };
            let snapshot = entry.read().await.clone();
            match self.store.save_resource(&snapshot).await {
                Ok(()) => entry.write().await.dirty = false,
                Err(e) => {
                    warn!(%tenant, pool = %id, error = %e, "failed saving resource");
                    failed.push((tenant, id));
                }
            }
            // randomize the load and give up the task between saves
            let pause = rand::thread_rng().gen_range(0..1000);
            tokio::time::sleep(StdDuration::from_nanos(pause)).await;
        }
        if !failed.is_empty() {
            let mut dirty = self.dirty.lock().await;
            for key in failed {
                dirty.insert(key);
            }
        }
    }

    /// Stores outstanding dirty state; called on service stop.
    pub async fn shutdown(&self) {
        info!("admission service shutdown initialized");
        self.store_dirty().await;
        info!("admission service shutdown complete");
    }

    fn notify(&self, event_type: &str, pool: &ResourcePool, usage: ResourceUsage, total: f64) {
        let Some(observer) = &self.observer else {
            return;
        };
        if pool.thresholds_disabled() {
            return;
        }
        observer.notify(
            event_type,
            &pool.tenant,
            &pool.id,
            pool.threshold_ids.clone(),
            usage,
            total,
        );
    }

}

fn validate_usage_id(usage_id: &str) -> Result<(), AdmissionError> {
    if usage_id.is_empty() {
        return Err(AdmissionError::InvalidRequest(
            "missing usage id".to_string(),
        ));
    }
    Ok(())
}

// src/models/resource.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::AdmissionError;

/// One caller's reservation against a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub tenant: String,
    /// Caller-supplied correlation id, e.g. a FreeSWITCH UUID. Unique
    /// within a pool for as long as the usage is live.
    pub id: String,
    /// `None` means the reservation never expires on its own and must be
    /// explicitly released.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
    pub units: f64,
}

impl ResourceUsage {
    pub fn tenant_id(&self) -> String {
        format!("{}:{}", self.tenant, self.id)
    }

    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        match self.expiry_time {
            Some(expiry) => expiry > at,
            None => true,
        }
    }
}

/// Runtime state backing one pool: the live reservations table.
///
/// Not synchronized itself; every mutation happens under the pool's named
/// lock held by the admission engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub tenant: String,
    pub id: String,
    pub usages: HashMap<String, ResourceUsage>,
    /// Usage ids carrying an expiry time, in insertion order, so the sweep
    /// does not have to scan usages without a TTL.
    #[serde(default)]
    pub ttl_idx: Vec<String>,
    /// Cached sum of units, invalidated on sweep.
    #[serde(skip)]
    total_cached: Option<f64>,
    /// Needs saving to the persistence adapter.
    #[serde(skip)]
    pub(crate) dirty: bool,
}

impl Resource {
    pub fn new(tenant: &str, id: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            id: id.to_string(),
            usages: HashMap::new(),
            ttl_idx: Vec::new(),
            total_cached: None,
            dirty: false,
        }
    }

    pub fn tenant_id(&self) -> String {
        format!("{}:{}", self.tenant, self.id)
    }

    /// Sum of units of all recorded usages. Expired entries are swept
    /// before any capacity decision, so after `remove_expired` this is the
    /// live total.
    pub fn total_usage(&mut self) -> f64 {
        if self.total_cached.is_none() {
            self.total_cached = Some(self.usages.values().map(|u| u.units).sum());
        }
        self.total_cached.unwrap_or(0.0)
    }

    /// Removes every usage whose expiry time has elapsed, returning the
    /// number of entries swept. Freed capacity is available immediately.
    pub fn remove_expired(&mut self, at: DateTime<Utc>) -> usize {
        let mut swept = 0;
        let mut kept = Vec::with_capacity(self.ttl_idx.len());
        for usage_id in self.ttl_idx.drain(..) {
            let expired = match self.usages.get(&usage_id) {
                Some(usage) => !usage.is_active(at),
                None => true, // index entry without a backing usage
            };
            if expired {
                if let Some(usage) = self.usages.remove(&usage_id) {
                    if let Some(total) = self.total_cached.as_mut() {
                        *total -= usage.units;
                        if *total < 0.0 {
                            warn!(
                                resource = %self.id,
                                total = *total,
                                "resetting total usage, sum went below zero"
                            );
                            self.total_cached = None;
                        }
                    }
                    swept += 1;
                }
            } else {
                kept.push(usage_id);
            }
        }
        self.ttl_idx = kept;
        if swept > 0 {
            self.dirty = true;
        }
        swept
    }

    /// Records a reservation, returning it with its computed expiry. A live
    /// usage with the same id is rejected as a duplicate; an expired one is
    /// overwritten in place (the new units replace the old, they are not
    /// added).
    pub fn record_usage(
        &mut self,
        mut usage: ResourceUsage,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<ResourceUsage, AdmissionError> {
        if let Some(existing) = self.usages.get(&usage.id) {
            if existing.is_active(now) {
                return Err(AdmissionError::DuplicateUsage(usage.tenant_id()));
            }
            self.clear_usage(&usage.id)?;
        }
        usage.expiry_time = ttl.map(|d| now + d);
        if usage.expiry_time.is_some() {
            self.ttl_idx.push(usage.id.clone());
        }
        if let Some(total) = self.total_cached.as_mut() {
            *total += usage.units;
        }
        self.usages.insert(usage.id.clone(), usage.clone());
        self.dirty = true;
        Ok(usage)
    }

    /// Removes the usage with the given id, giving its units back to the
    /// pool. Errors when no such record exists.
    pub fn clear_usage(&mut self, usage_id: &str) -> Result<ResourceUsage, AdmissionError> {
        let usage = self
            .usages
            .remove(usage_id)
            .ok_or_else(|| AdmissionError::UsageNotFound(usage_id.to_string()))?;
        if usage.expiry_time.is_some() {
            self.ttl_idx.retain(|id| id != usage_id);
        }
        if let Some(total) = self.total_cached.as_mut() {
            *total -= usage.units;
        }
        self.dirty = true;
        Ok(usage)
    }

    /// Whether a live (non-expired) usage with this id exists.
    pub fn has_live_usage(&self, usage_id: &str, at: DateTime<Utc>) -> bool {
        self.usages
            .get(usage_id)
            .map(|u| u.is_active(at))
            .unwrap_or(false)
    }

    /// Read-only view with expired-but-unswept usages filtered out.
    pub fn live_snapshot(&self, at: DateTime<Utc>) -> Resource {
        let usages: HashMap<String, ResourceUsage> = self
            .usages
            .iter()
            .filter(|(_, u)| u.is_active(at))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let ttl_idx = self
            .ttl_idx
            .iter()
            .filter(|id| usages.contains_key(*id))
            .cloned()
            .collect();
        Resource {
            tenant: self.tenant.clone(),
            id: self.id.clone(),
            usages,
            ttl_idx,
            total_cached: None,
            dirty: false,
        }
    }
}

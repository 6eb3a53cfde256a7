// src/models/mod.rs
pub mod event;
pub mod pool;
pub mod resource;

pub use event::{AttrValue, Event};
pub use pool::{ActivationInterval, ResourcePool, META_NONE};
pub use resource::{Resource, ResourceUsage};

use serde::{Deserialize, Serialize};

// ==================== API DTOs ====================

/// Body shared by the admission operations.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRequest {
    pub tenant: String,
    #[serde(default)]
    pub event: Event,
    pub usage_id: String,
    /// Units to reserve; defaults to 1.
    #[serde(default)]
    pub units: Option<f64>,
    /// Per-request TTL override in seconds; non-zero replaces the pool TTL.
    #[serde(default)]
    pub usage_ttl_secs: Option<i64>,
}

impl ResourceRequest {
    pub fn units_or_default(&self) -> f64 {
        self.units.unwrap_or(1.0)
    }
}

/// Body for the read-only resources-for-event query.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesForEventRequest {
    pub tenant: String,
    #[serde(default)]
    pub event: Event,
    #[serde(default)]
    pub usage_ttl_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AllocationResponse {
    pub allocation_message: String,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

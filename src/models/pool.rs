// src/models/pool.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Threshold target disabling the observer hook for a pool.
pub const META_NONE: &str = "*none";

/// Configuration of one capacity pool. Owned by the profile catalog,
/// read-only to the admission engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePool {
    pub tenant: String,
    pub id: String,
    /// Filter references deciding whether an event is subject to this pool.
    /// Empty means the pool matches every event.
    #[serde(default)]
    pub filter_ids: Vec<String>,
    #[serde(default)]
    pub activation_interval: Option<ActivationInterval>,
    /// Seconds after which an unreleased usage auto-expires. Zero or
    /// negative (canonically -1) means usages never expire on their own.
    #[serde(default = "default_usage_ttl")]
    pub usage_ttl_secs: i64,
    /// Capacity in units. -1 means unlimited: the pool never rejects,
    /// usages are still tracked but the capacity check is skipped. An
    /// unspecified limit is unlimited.
    #[serde(default = "default_limit")]
    pub limit: f64,
    /// Message returned to the caller when this pool grants a reservation.
    /// Empty defaults to the pool id.
    #[serde(default)]
    pub allocation_message: String,
    /// A blocker pool stops the candidate walk, see `BlockerPolicy`.
    #[serde(default)]
    pub blocker: bool,
    /// Whether live state survives a restart.
    #[serde(default)]
    pub stored: bool,
    #[serde(default)]
    pub weight: f64,
    /// Observer hook targets. `["*none"]` disables notifications.
    #[serde(default)]
    pub threshold_ids: Vec<String>,
}

impl ResourcePool {
    /// Unique identifier in a multi-tenant environment.
    pub fn tenant_id(&self) -> String {
        format!("{}:{}", self.tenant, self.id)
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit < 0.0
    }

    /// Message sent back to the caller on a granted reservation.
    pub fn grant_message(&self) -> &str {
        if self.allocation_message.is_empty() {
            &self.id
        } else {
            &self.allocation_message
        }
    }

    /// Effective usage TTL, honoring a per-request override. A non-positive
    /// TTL disables auto-expiry.
    pub fn effective_ttl(&self, override_secs: Option<i64>) -> Option<Duration> {
        let secs = match override_secs {
            Some(s) if s != 0 => s,
            _ => self.usage_ttl_secs,
        };
        if secs > 0 {
            Some(Duration::seconds(secs))
        } else {
            None
        }
    }

    /// Whether the observer hook is disabled for this pool.
    pub fn thresholds_disabled(&self) -> bool {
        self.threshold_ids.len() == 1 && self.threshold_ids[0] == META_NONE
    }

    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        match &self.activation_interval {
            Some(interval) => interval.is_active_at(at),
            None => true,
        }
    }
}

fn default_usage_ttl() -> i64 {
    -1
}

fn default_limit() -> f64 {
    -1.0
}

/// Half-open time window `[activation_time, expiry_time)` outside which a
/// pool is invisible to matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationInterval {
    #[serde(default)]
    pub activation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiry_time: Option<DateTime<Utc>>,
}

impl ActivationInterval {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        if let Some(start) = self.activation_time {
            if at < start {
                return false;
            }
        }
        if let Some(end) = self.expiry_time {
            if at >= end {
                return false;
            }
        }
        true
    }
}

// src/services/selector.rs
use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::catalog::ProfileCatalog;
use crate::error::AdmissionError;
use crate::filters::FilterEvaluator;
use crate::models::{Event, ResourcePool};

/// How a blocker pool cuts the candidate walk short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockerPolicy {
    /// A blocker pool that matched truncates the candidate list after
    /// itself; an unmatched blocker is simply skipped.
    #[default]
    OnMatch,
    /// Additionally, an unmatched blocker pool stops evaluation entirely,
    /// acting as an explicit deny rule for everything below it.
    Strict,
}

impl FromStr for BlockerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on-match" => Ok(BlockerPolicy::OnMatch),
            "strict" => Ok(BlockerPolicy::Strict),
            other => Err(format!("unknown blocker policy: {}", other)),
        }
    }
}

/// A pool that matched an event, with the TTL in effect for this operation.
#[derive(Debug, Clone)]
pub struct MatchedPool {
    pub profile: Arc<ResourcePool>,
    pub effective_ttl: Option<Duration>,
}

/// Resolves the weight-ordered candidate pool list for an event.
pub struct PoolSelector {
    catalog: Arc<dyn ProfileCatalog>,
    filters: Arc<dyn FilterEvaluator>,
    blocker_policy: BlockerPolicy,
}

impl PoolSelector {
    pub fn new(
        catalog: Arc<dyn ProfileCatalog>,
        filters: Arc<dyn FilterEvaluator>,
        blocker_policy: BlockerPolicy,
    ) -> Self {
        Self {
            catalog,
            filters,
            blocker_policy,
        }
    }

    /// Ordered (highest weight first) list of pools the event is subject
    /// to. `NotFound` when none survive.
    pub async fn select(
        &self,
        tenant: &str,
        event: &Event,
        usage_ttl_override: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchedPool>, AdmissionError> {
        let mut candidates = self.catalog.pools_for_tenant(tenant).await?;

        // stable sort keeps catalog order for equal weights
        candidates.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let at = event.reference_time(now);
        let mut matched = Vec::new();
        for pool in candidates {
            if !pool.is_active_at(at) {
                continue;
            }
            let passes = match self
                .filters
                .matches(tenant, event, &pool.filter_ids)
                .await
            {
                Ok(passes) => passes,
                Err(e) => {
                    // an evaluation failure makes this pool non-matching,
                    // it never fails the whole call
                    warn!(tenant, pool = %pool.id, error = %e, "filter evaluation failed");
                    false
                }
            };
            if passes {
                let is_blocker = pool.blocker;
                matched.push(MatchedPool {
                    effective_ttl: pool.effective_ttl(usage_ttl_override),
                    profile: pool,
                });
                if is_blocker {
                    break;
                }
            } else if pool.blocker && self.blocker_policy == BlockerPolicy::Strict {
                break;
            }
        }

        if matched.is_empty() {
            return Err(AdmissionError::NotFound(format!(
                "no resource pools matching event for tenant: {}",
                tenant
            )));
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::filters::{FilterRule, InMemoryFilterStore};
    use crate::models::{ActivationInterval, AttrValue};

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

    fn account_event(account: &str) -> Event {
        let mut ev = Event::default();
        ev.attributes.insert(
            "Account".to_string(),
            AttrValue::String(account.to_string()),
        );
        ev
    }

    async fn selector_with(
        pools: Vec<ResourcePool>,
        policy: BlockerPolicy,
    ) -> (PoolSelector, Arc<InMemoryFilterStore>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        for p in pools {
            catalog.set_pool(p).await;
        }
        let filters = Arc::new(InMemoryFilterStore::new());
        (
            PoolSelector::new(catalog, filters.clone(), policy),
            filters,
        )
    }

    #[tokio::test]
    async fn test_weight_ordering() {
        let (selector, _) = selector_with(
            vec![pool("LOW", 5.0), pool("HIGH", 20.0), pool("MID", 10.0)],
            BlockerPolicy::OnMatch,
        )
        .await;
        let matched = selector
            .select("cgrates.org", &Event::default(), None, Utc::now())
            .await
            .unwrap();
        let ids: Vec<&str> = matched.iter().map(|m| m.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["HIGH", "MID", "LOW"]);
    }

    #[tokio::test]
    async fn test_weight_tie_keeps_catalog_order() {
        let (selector, _) = selector_with(
            vec![pool("FIRST", 10.0), pool("SECOND", 10.0)],
            BlockerPolicy::OnMatch,
        )
        .await;
        let matched = selector
            .select("cgrates.org", &Event::default(), None, Utc::now())
            .await
            .unwrap();
        let ids: Vec<&str> = matched.iter().map(|m| m.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["FIRST", "SECOND"]);
    }

    #[tokio::test]
    async fn test_activation_window_excludes_pool() {
        let mut expired = pool("EXPIRED", 20.0);
        expired.activation_interval = Some(ActivationInterval {
            activation_time: None,
            expiry_time: Some(Utc::now() - chrono::Duration::hours(1)),
        });
        let (selector, _) = selector_with(
            vec![expired, pool("ACTIVE", 10.0)],
            BlockerPolicy::OnMatch,
        )
        .await;
        let matched = selector
            .select("cgrates.org", &Event::default(), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].profile.id, "ACTIVE");
    }

    #[tokio::test]
    async fn test_filter_gates_pool(){
        let mut gated = pool("GATED", 20.0);
        gated.filter_ids = vec!["FLTR_ACC_1002".to_string()];
        let (selector, filters) = selector_with(
            vec![gated, pool("OPEN", 10.0)],
            BlockerPolicy::OnMatch,
        )
        .await;
        filters
            .set_rule(
                "cgrates.org",
                "FLTR_ACC_1002",
                FilterRule {
                    field: "Account".to_string(),
                    values: vec!["1002".to_string()],
                },
            )
            .await;

        let matched = selector
            .select("cgrates.org", &account_event("1002"), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(matched.len(), 2);

        let matched = selector
            .select("cgrates.org", &account_event("1001"), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].profile.id, "OPEN");
    }

    #[tokio::test]
    async fn test_matched_blocker_truncates_walk() {
        let mut blocker = pool("BLOCKER", 15.0);
        blocker.blocker = true;
        let (selector, _) = selector_with(
            vec![pool("TOP", 20.0), blocker, pool("BELOW", 5.0)],
            BlockerPolicy::OnMatch,
        )
        .await;
        let matched = selector
            .select("cgrates.org", &Event::default(), None, Utc::now())
            .await
            .unwrap();
        let ids: Vec<&str> = matched.iter().map(|m| m.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["TOP", "BLOCKER"]);
    }

    #[tokio::test]
    async fn test_unmatched_blocker_skipped_under_on_match_policy() {
        let mut blocker = pool("BLOCKER", 15.0);
        blocker.blocker = true;
        blocker.filter_ids = vec!["FLTR_NEVER".to_string()]; // unknown => non-match
        let (selector, _) = selector_with(
            vec![pool("TOP", 20.0), blocker, pool("BELOW", 5.0)],
            BlockerPolicy::OnMatch,
        )
        .await;
        let matched = selector
            .select("cgrates.org", &Event::default(), None, Utc::now())
            .await
            .unwrap();
        let ids: Vec<&str> = matched.iter().map(|m| m.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["TOP", "BELOW"]);
    }

    #[tokio::test]
    async fn test_unmatched_blocker_stops_walk_under_strict_policy() {
        let mut blocker = pool("BLOCKER", 15.0);
        blocker.blocker = true;
        blocker.filter_ids = vec!["FLTR_NEVER".to_string()];
        let (selector, _) = selector_with(
            vec![pool("TOP", 20.0), blocker, pool("BELOW", 5.0)],
            BlockerPolicy::Strict,
        )
        .await;
        let matched = selector
            .select("cgrates.org", &Event::default(), None, Utc::now())
            .await
            .unwrap();
        let ids: Vec<&str> = matched.iter().map(|m| m.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["TOP"]);
    }

    #[tokio::test]
    async fn test_no_survivors_is_not_found() {
        let mut gated = pool("GATED", 10.0);
        gated.filter_ids = vec!["FLTR_NEVER".to_string()];
        let (selector, _) = selector_with(vec![gated], BlockerPolicy::OnMatch).await;
        let err = selector
            .select("cgrates.org", &Event::default(), None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_event_time_used_for_activation() {
        let start = Utc::now() + chrono::Duration::hours(1);
        let mut future_pool = pool("FUTURE", 10.0);
        future_pool.activation_interval = Some(ActivationInterval {
            activation_time: Some(start),
            expiry_time: None,
        });
        let (selector, _) = selector_with(vec![future_pool], BlockerPolicy::OnMatch).await;

        // not active now
        assert!(selector
            .select("cgrates.org", &Event::default(), None, Utc::now())
            .await
            .is_err());

        // but active at the event's declared time
        let mut ev = Event::default();
        ev.time = Some(start + chrono::Duration::minutes(1));
        assert!(selector
            .select("cgrates.org", &ev, None, Utc::now())
            .await
            .is_ok());
    }
}

// src/filters.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::AdmissionError;
use crate::models::Event;

/// Black-box predicate deciding whether an event is subject to a pool.
///
/// The filter definition language itself lives outside this service; the
/// engine only depends on this trait. All referenced filters must pass for
/// the event to match. An unknown filter reference or a missing event field
/// fails that specific filter, never the whole call.
#[async_trait]
pub trait FilterEvaluator: Send + Sync {
    async fn matches(
        &self,
        tenant: &str,
        event: &Event,
        filter_ids: &[String],
    ) -> Result<bool, AdmissionError>;
}

/// One named predicate: the event field must equal any of the values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub field: String,
    pub values: Vec<String>,
}

impl FilterRule {
    fn passes(&self, event: &Event) -> bool {
        match event.attribute(&self.field) {
            Some(value) => {
                let have = value.as_match_str();
                self.values.iter().any(|v| *v == have)
            }
            None => false, // missing field fails the filter, not the call
        }
    }
}

/// In-memory filter registry keyed by `tenant:filter_id`.
#[derive(Default)]
pub struct InMemoryFilterStore {
    rules: RwLock<HashMap<String, FilterRule>>,
}

impl InMemoryFilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_rule(&self, tenant: &str, filter_id: &str, rule: FilterRule) {
        let mut rules = self.rules.write().await;
        rules.insert(format!("{}:{}", tenant, filter_id), rule);
    }
}

#[async_trait]
impl FilterEvaluator for InMemoryFilterStore {
    async fn matches(
        &self,
        tenant: &str,
        event: &Event,
        filter_ids: &[String],
    ) -> Result<bool, AdmissionError> {
        if filter_ids.is_empty() {
            return Ok(true);
        }
        let rules = self.rules.read().await;
        for filter_id in filter_ids {
            let key = format!("{}:{}", tenant, filter_id);
            match rules.get(&key) {
                Some(rule) => {
                    if !rule.passes(event) {
                        return Ok(false);
                    }
                }
                None => {
                    debug!(tenant, filter_id, "unknown filter reference, failing it");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

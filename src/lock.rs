// src/lock.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::AdmissionError;

/// Named, timeout-bounded mutual exclusion.
///
/// Concurrent admission decisions against the same pool serialize on the
/// pool's key; different keys proceed fully in parallel. A guard releases
/// the lock on drop. Acquisition that exceeds the timeout fails with
/// `LockTimeout` and the caller has mutated nothing.
#[derive(Default)]
pub struct LockManager {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<OwnedMutexGuard<()>, AdmissionError> {
        let slot = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        debug!(key, "acquiring lock");
        tokio::time::timeout(timeout, slot.lock_owned())
            .await
            .map_err(|_| AdmissionError::LockTimeout(key.to_string()))
    }
}

/// Lock key for a pool's live state.
pub fn resource_lock_key(tenant: &str, pool_id: &str) -> String {
    format!("res:{}:{}", tenant, pool_id)
}

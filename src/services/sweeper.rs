// src/services/sweeper.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::services::AdmissionService;

/// Starts the periodic expiry sweep and, when configured, the periodic
/// backup of dirty stored pools. Both loops run until the process exits;
/// outstanding dirty state is flushed by `AdmissionService::shutdown`.
pub fn spawn_background(
    service: Arc<AdmissionService>,
    sweep_interval_secs: u64,
    store_interval_secs: i64,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if sweep_interval_secs > 0 {
        let svc = service.clone();
        info!(interval_secs = sweep_interval_secs, "expiry sweep started");
        handles.push(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(sweep_interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let swept = svc.sweep_expired().await;
                if swept > 0 {
                    debug!(swept, "expiry sweep removed usages");
                }
            }
        }));
    }

    if store_interval_secs > 0 {
        let svc = service.clone();
        info!(interval_secs = store_interval_secs, "resource backup started");
        handles.push(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(store_interval_secs as u64));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                svc.store_dirty().await;
            }
        }));
    }

    handles
}

// src/observer.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AdmissionError;
use crate::models::ResourceUsage;

pub const EVENT_ALLOCATE: &str = "ResourceAllocate";
pub const EVENT_RELEASE: &str = "ResourceRelease";

/// Notification handed to the threshold subsystem after a committed
/// allocate or release.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdNotification {
    pub event_id: Uuid,
    pub event_type: String,
    pub tenant: String,
    pub pool_id: String,
    /// Explicit targets from the pool profile; empty lets the threshold
    /// service match on its own.
    pub threshold_ids: Vec<String>,
    pub usage: ResourceUsage,
    pub total_usage: f64,
    pub origin_host: String,
    pub at: DateTime<Utc>,
}

/// Delivery backend for threshold notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThresholdNotifier: Send + Sync {
    async fn deliver(&self, note: ThresholdNotification) -> Result<(), AdmissionError>;
}

/// Default sink when no threshold endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl ThresholdNotifier for LogNotifier {
    async fn deliver(&self, note: ThresholdNotification) -> Result<(), AdmissionError> {
        debug!(
            event_type = %note.event_type,
            tenant = %note.tenant,
            pool = %note.pool_id,
            total_usage = note.total_usage,
            "threshold notification (no endpoint configured)"
        );
        Ok(())
    }
}

/// Posts notifications to the threshold subsystem over HTTP.
pub struct HttpNotifier {
    http_client: Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: &str, timeout_ms: u64) -> Result<Self, AdmissionError> {
        let http_client = ClientBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_max_idle_per_host(20)
            .build()
            .map_err(|e| AdmissionError::Internal(e.to_string()))?;
        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ThresholdNotifier for HttpNotifier {
    async fn deliver(&self, note: ThresholdNotification) -> Result<(), AdmissionError> {
        let resp = self
            .http_client
            .post(&self.endpoint)
            .json(&note)
            .send()
            .await
            .map_err(|e| AdmissionError::Internal(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AdmissionError::Internal(format!(
                "threshold endpoint returned status {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Fire-and-continue observer hook.
///
/// Notifications are handed off through a bounded queue after the pool lock
/// is released; a slow or failing threshold subsystem can neither block nor
/// fail the admission decision. Delivery is at-most-once with no retry:
/// when the queue is full the notification is dropped and logged.
#[derive(Clone)]
pub struct ObserverHook {
    tx: mpsc::Sender<ThresholdNotification>,
    origin_host: String,
}

impl ObserverHook {
    pub fn spawn(notifier: Arc<dyn ThresholdNotifier>, queue_size: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<ThresholdNotification>(queue_size.max(1));
        tokio::spawn(async move {
            while let Some(note) = rx.recv().await {
                if let Err(e) = notifier.deliver(note.clone()).await {
                    warn!(
                        event_type = %note.event_type,
                        pool = %note.pool_id,
                        error = %e,
                        "threshold notification failed, dropping"
                    );
                }
            }
        });
        let origin_host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "resource-admission".to_string());
        Self { tx, origin_host }
    }

    pub fn notify(
        &self,
        event_type: &str,
        tenant: &str,
        pool_id: &str,
        threshold_ids: Vec<String>,
        usage: ResourceUsage,
        total_usage: f64,
    ) {
        let note = ThresholdNotification {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            tenant: tenant.to_string(),
            pool_id: pool_id.to_string(),
            threshold_ids,
            usage,
            total_usage,
            origin_host: self.origin_host.clone(),
            at: Utc::now(),
        };
        if let Err(e) = self.tx.try_send(note) {
            warn!(pool = %pool_id, error = %e, "observer queue full, dropping notification");
        }
    }
}

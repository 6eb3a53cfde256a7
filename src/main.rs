// src/main.rs
use actix_web::{middleware, web, App, HttpServer};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use resource_admission::api;
use resource_admission::catalog::InMemoryCatalog;
use resource_admission::config::Config;
use resource_admission::filters::{FilterRule, InMemoryFilterStore};
use resource_admission::models::ResourcePool;
use resource_admission::observer::{HttpNotifier, LogNotifier, ObserverHook, ThresholdNotifier};
use resource_admission::persistence::{InMemoryStore, PersistenceAdapter, RedisStore};
use resource_admission::services::{
    spawn_background, AdmissionConfig, AdmissionService,
};

/// Pool and filter definitions loaded at boot when `PROFILE_FILE` is set.
#[derive(Debug, Deserialize)]
struct ProfileSeed {
    #[serde(default)]
    pools: Vec<ResourcePool>,
    /// Filter rules keyed by `tenant:filter_id`.
    #[serde(default)]
    filters: HashMap<String, FilterRule>,
}

async fn seed_profiles(
    path: &str,
    catalog: &InMemoryCatalog,
    filters: &InMemoryFilterStore,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let seed: ProfileSeed = serde_json::from_str(&raw)?;
    let pool_count = seed.pools.len();
    for pool in seed.pools {
        catalog.set_pool(pool).await;
    }
    let mut rule_count = 0usize;
    for (key, rule) in seed.filters {
        match key.split_once(':') {
            Some((tenant, filter_id)) => {
                filters.set_rule(tenant, filter_id, rule).await;
                rule_count += 1;
            }
            None => warn!(%key, "skipping filter rule without tenant prefix"),
        }
    }
    info!(pools = pool_count, filters = rule_count, path, "profiles seeded");
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("starting resource admission service");

    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;
    info!("environment: {}", config.environment);

    let catalog = Arc::new(InMemoryCatalog::new());
    let filters = Arc::new(InMemoryFilterStore::new());
    if let Some(path) = &config.profile_file {
        seed_profiles(path, &catalog, &filters).await?;
    }

    let store: Arc<dyn PersistenceAdapter> = match &config.redis_url {
        Some(url) => {
            let redis = RedisStore::new(url).await?;
            info!("redis store connected");
            Arc::new(redis)
        }
        None => {
            warn!("no REDIS_URL configured, stored pools will not survive restarts");
            Arc::new(InMemoryStore::new())
        }
    };

    let notifier: Arc<dyn ThresholdNotifier> = match &config.threshold_url {
        Some(url) => Arc::new(HttpNotifier::new(url, config.threshold_timeout_ms)?),
        None => Arc::new(LogNotifier),
    };
    let observer = ObserverHook::spawn(notifier, config.observer_queue_size);

    let service = Arc::new(AdmissionService::new(
        catalog.clone(),
        filters.clone(),
        store,
        Some(observer),
        AdmissionConfig {
            lock_timeout: config.lock_timeout,
            store_interval_secs: config.store_interval_secs,
            blocker_policy: config.blocker_policy,
        },
    ));

    // stored pool state must be back in memory before traffic is accepted
    service.warm_up().await?;

    let _background = spawn_background(
        service.clone(),
        config.sweep_interval_secs,
        config.store_interval_secs,
    );

    let bind_address = format!("{}:{}", config.host, config.port);
    info!("starting HTTP server on {}", bind_address);

    let server_service = service.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(web::Data::new(server_service.clone()))
            .configure(api::routes::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    service.shutdown().await;
    Ok(())
}

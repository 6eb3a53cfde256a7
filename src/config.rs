// src/config.rs
use std::env;
use std::time::Duration;

use crate::services::BlockerPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// Redis endpoint for stored pools; absent means the in-memory store
    /// (stored pools then only survive as long as the process).
    pub redis_url: Option<String>,
    /// Threshold subsystem endpoint for observer notifications.
    pub threshold_url: Option<String>,
    pub threshold_timeout_ms: u64,
    pub lock_timeout: Duration,
    /// -1 write-through, 0 disabled, >0 periodic backup interval.
    pub store_interval_secs: i64,
    /// 0 disables the background expiry sweep.
    pub sweep_interval_secs: u64,
    pub blocker_policy: BlockerPolicy,
    pub observer_queue_size: usize,
    /// Optional JSON file seeding the pool catalog and filter registry.
    pub profile_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let blocker_policy = env::var("BLOCKER_POLICY")
            .unwrap_or_else(|_| "on-match".to_string())
            .parse::<BlockerPolicy>()?;

        Ok(Config {
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "production".to_string()),
            host: env::var("HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "9100".to_string())
                .parse()?,
            redis_url: env::var("REDIS_URL").ok(),
            threshold_url: env::var("THRESHOLD_URL").ok(),
            threshold_timeout_ms: env::var("THRESHOLD_TIMEOUT_MS")
                .unwrap_or_else(|_| "200".to_string())
                .parse()?,
            lock_timeout: Duration::from_millis(
                env::var("LOCK_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()?,
            ),
            store_interval_secs: env::var("STORE_INTERVAL_SECS")
                .unwrap_or_else(|_| "-1".to_string())
                .parse()?,
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            blocker_policy,
            observer_queue_size: env::var("OBSERVER_QUEUE_SIZE")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()?,
            profile_file: env::var("PROFILE_FILE").ok(),
        })
    }
}

use std::env;
use std::time::Duration;

use anyhow::Context;

use crate::DEFAULT_HOLD_TTL_SECS;

/// Runtime configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub hold_ttl: Duration,
    pub sweep_interval: Duration,
    pub sweep_batch: usize,
    pub outbox_poll_interval: Duration,
    pub outbox_batch: i64,
    pub webhook_secret: String,
    pub webhook_max_skew_secs: i64,
    pub notify_base_url: Option<String>,
    pub kafka_bootstrap: String,
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let webhook_secret =
            env::var("WEBHOOK_ACTIVE_SECRET").context("WEBHOOK_ACTIVE_SECRET must be set")?;
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8088),
            database_url,
            hold_ttl: Duration::from_secs(env_u64("HOLD_TTL_SECS", DEFAULT_HOLD_TTL_SECS)),
            sweep_interval: Duration::from_secs(env_u64("HOLD_SWEEP_INTERVAL_SECS", 60)),
            sweep_batch: env_u64("HOLD_SWEEP_BATCH", 200) as usize,
            outbox_poll_interval: Duration::from_millis(env_u64("OUTBOX_POLL_MILLIS", 1_000)),
            outbox_batch: env_u64("OUTBOX_BATCH", 100) as i64,
            webhook_secret,
            webhook_max_skew_secs: env_u64("WEBHOOK_MAX_SKEW_SECS", 300) as i64,
            notify_base_url: env::var("NOTIFY_BASE_URL").ok(),
            kafka_bootstrap: env::var("KAFKA_BOOTSTRAP")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
        })
    }
}

use std::env;
use std::time::Duration;

use anyhow::Context;

use crate::consumer::RetryPolicy;
use crate::projector::SyncRetryPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub consumer_enabled: bool,
    pub kafka_bootstrap: String,
    pub consumer_group: String,
    pub search_base_url: String,
    pub search_index: String,
    pub retry: RetryPolicy,
    pub sync: SyncRetryPolicy,
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
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8091),
            database_url,
            consumer_enabled: env::var("SNAPSHOT_CONSUMER_ENABLED")
                .unwrap_or_else(|_| "true".into())
                == "true",
            kafka_bootstrap: env::var("KAFKA_BOOTSTRAP")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            consumer_group: env::var("SNAPSHOT_CONSUMER_GROUP")
                .unwrap_or_else(|_| "search-indexer".to_string()),
            search_base_url: env::var("SEARCH_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:7700".to_string()),
            search_index: env::var("SEARCH_INDEX").unwrap_or_else(|_| "hotels".to_string()),
            retry: RetryPolicy {
                max_retries: env_u64("CONSUMER_MAX_RETRIES", 5) as u32,
                base_delay: Duration::from_millis(env_u64("CONSUMER_RETRY_BASE_MILLIS", 1_000)),
                max_delay: Duration::from_millis(env_u64("CONSUMER_RETRY_MAX_MILLIS", 60_000)),
            },
            sync: SyncRetryPolicy {
                max_attempts: env_u64("SEARCH_SYNC_MAX_ATTEMPTS", 5) as u32,
                base_delay: Duration::from_millis(env_u64("SEARCH_SYNC_BASE_MILLIS", 200)),
                max_delay: Duration::from_millis(env_u64("SEARCH_SYNC_MAX_MILLIS", 5_000)),
            },
        })
    }
}

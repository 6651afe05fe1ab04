use std::{str::FromStr, time::Duration};

use deadpool_postgres::{
    Config, CreatePoolError, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use thiserror::Error;
use tokio_postgres::NoTls;

pub type PgPool = Pool;

const DEFAULT_MAX_SIZE: usize = 16;
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DbPoolError {
    #[error("invalid database url: {0}")]
    InvalidConfig(String),
    #[error("failed to create database pool: {0}")]
    PoolCreation(#[from] CreatePoolError),
}

/// Pool sizing for the match stores. Rematch batches hold one connection
/// per in-flight profile write, so `max_size` should cover
/// `REMATCH_MAX_CONCURRENT_PROFILES`.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    pub max_size: usize,
    /// How long a store call waits for a free connection before failing.
    pub wait_timeout: Duration,
    /// Reported to Postgres as `application_name`.
    pub application_name: String,
}

impl PoolSettings {
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            application_name: application_name.into(),
        }
    }

    /// Reads `SM_DB_POOL_MAX_SIZE` and `SM_DB_POOL_WAIT_TIMEOUT_MS`; unset,
    /// unparsable or zero values keep the defaults.
    pub fn from_env(application_name: impl Into<String>) -> Self {
        let defaults = Self::new(application_name);
        Self {
            max_size: positive_env("SM_DB_POOL_MAX_SIZE")
                .map(|n| n as usize)
                .unwrap_or(defaults.max_size),
            wait_timeout: positive_env("SM_DB_POOL_WAIT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.wait_timeout),
            ..defaults
        }
    }
}

fn positive_env(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}

/// Validates the URL and builds a lazily-connecting pool.
pub fn create_pool(db_url: &str, settings: &PoolSettings) -> Result<PgPool, DbPoolError> {
    tokio_postgres::Config::from_str(db_url)
        .map_err(|e| DbPoolError::InvalidConfig(e.to_string()))?;

    let mut cfg = Config::new();
    cfg.url = Some(db_url.to_string());
    cfg.application_name = Some(settings.application_name.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig {
        max_size: settings.max_size,
        timeouts: Timeouts {
            wait: Some(settings.wait_timeout),
            ..Timeouts::default()
        },
        ..PoolConfig::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(DbPoolError::PoolCreation)
}

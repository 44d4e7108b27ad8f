//! # Configuration
//!
//! Environment-aware configuration for the orchestration core. Defaults are
//! tuned for a single-process deployment; every knob can be overridden through
//! `COLLECTION_*` environment variables.

use crate::error::{CollectionError, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CollectionConfig {
    pub database_url: String,
    /// Global cap on simultaneously STARTED/IN_PROGRESS sagas
    pub saga_concurrency_cap: u64,
    /// Per-category candidate limit per scheduler tick
    pub tick_batch_size: usize,
    /// Interval between scheduler ticks
    pub scheduler_interval: Duration,
    /// Sagas younger than this are never swept (avoids racing a live consumer)
    pub sweeper_grace_period: Duration,
    /// Maximum sagas examined per sweeper tick
    pub sweeper_batch_cap: usize,
    /// Interval between sweeper ticks
    pub sweeper_interval: Duration,
    /// Incomplete filesets older than this are purged
    pub fileset_stale_window: Duration,
    /// All filesets older than this are purged
    pub fileset_age_window: Duration,
    /// COMPLETED sagas older than this are purged
    pub saga_retention_window: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/grad_collection_development".to_string(),
            saga_concurrency_cap: 100,
            tick_batch_size: 20,
            scheduler_interval: Duration::from_secs(10),
            sweeper_grace_period: Duration::from_secs(120),
            sweeper_batch_cap: 500,
            sweeper_interval: Duration::from_secs(60),
            fileset_stale_window: Duration::from_secs(30 * 24 * 3600),
            fileset_age_window: Duration::from_secs(3 * 365 * 24 * 3600),
            saga_retention_window: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

impl CollectionConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(cap) = std::env::var("COLLECTION_SAGA_CONCURRENCY_CAP") {
            config.saga_concurrency_cap = cap.parse().map_err(|e| {
                CollectionError::configuration(format!("Invalid saga_concurrency_cap: {e}"))
            })?;
        }

        if let Ok(batch) = std::env::var("COLLECTION_TICK_BATCH_SIZE") {
            config.tick_batch_size = batch.parse().map_err(|e| {
                CollectionError::configuration(format!("Invalid tick_batch_size: {e}"))
            })?;
        }

        if let Ok(secs) = std::env::var("COLLECTION_SWEEPER_GRACE_SECONDS") {
            config.sweeper_grace_period = Duration::from_secs(secs.parse().map_err(|e| {
                CollectionError::configuration(format!("Invalid sweeper_grace_seconds: {e}"))
            })?);
        }

        if let Ok(cap) = std::env::var("COLLECTION_SWEEPER_BATCH_CAP") {
            config.sweeper_batch_cap = cap.parse().map_err(|e| {
                CollectionError::configuration(format!("Invalid sweeper_batch_cap: {e}"))
            })?;
        }

        if let Ok(days) = std::env::var("COLLECTION_FILESET_STALE_DAYS") {
            let days: u64 = days.parse().map_err(|e| {
                CollectionError::configuration(format!("Invalid fileset_stale_days: {e}"))
            })?;
            config.fileset_stale_window = Duration::from_secs(days * 24 * 3600);
        }

        Ok(config)
    }
}

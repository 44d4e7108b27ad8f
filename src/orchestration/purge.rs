//! # Retention Purge
//!
//! Periodic data hygiene: filesets that never completed within the stale
//! window, filesets past the multi-year age window regardless of status, and
//! COMPLETED sagas (with their event log rows) past the saga retention
//! window. Fileset deletion cascades to the child records through the store.

use crate::config::CollectionConfig;
use crate::constants::system;
use crate::error::Result;
use crate::persistence::{CollectionStore, SagaStore};
use crate::state_machine::{FilesetStateMachine, FilesetStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

pub struct RetentionPurger {
    store: Arc<dyn CollectionStore>,
    saga_store: Arc<dyn SagaStore>,
    stale_window: Duration,
    age_window: Duration,
    saga_retention_window: Duration,
}

/// What one purge pass removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PurgeSummary {
    pub stale_filesets: usize,
    pub aged_filesets: usize,
    pub purged_sagas: u64,
}

impl RetentionPurger {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        saga_store: Arc<dyn SagaStore>,
        config: &CollectionConfig,
    ) -> Self {
        Self {
            store,
            saga_store,
            stale_window: config.fileset_stale_window,
            age_window: config.fileset_age_window,
            saga_retention_window: config.saga_retention_window,
        }
    }

    /// Run purge passes forever at the given interval.
    pub async fn run(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_ms = interval.as_millis() as u64, "Retention purger running");
        loop {
            ticker.tick().await;
            match self.purge().await {
                Ok(summary)
                    if summary.stale_filesets > 0
                        || summary.aged_filesets > 0
                        || summary.purged_sagas > 0 =>
                {
                    info!(
                        stale_filesets = summary.stale_filesets,
                        aged_filesets = summary.aged_filesets,
                        purged_sagas = summary.purged_sagas,
                        "Purge pass finished"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Purge pass failed"),
            }
        }
    }

    /// One purge pass across all three retention policies.
    #[instrument(skip(self))]
    pub async fn purge(&self) -> Result<PurgeSummary> {
        let now = Utc::now();
        let mut summary = PurgeSummary::default();

        summary.stale_filesets = self
            .purge_filesets(cutoff(now, self.stale_window), true)
            .await?;
        summary.aged_filesets = self
            .purge_filesets(cutoff(now, self.age_window), false)
            .await?;
        summary.purged_sagas = self
            .saga_store
            .purge_completed_before(cutoff(now, self.saga_retention_window))
            .await?;

        Ok(summary)
    }

    async fn purge_filesets(&self, cutoff: DateTime<Utc>, stale_only: bool) -> Result<usize> {
        let filesets = if stale_only {
            self.store.stale_filesets(cutoff).await?
        } else {
            self.store.aged_filesets(cutoff).await?
        };
        let mut removed = 0;
        for mut fileset in filesets {
            info!(
                fileset_id = %fileset.fileset_id,
                school_id = %fileset.school_id,
                status = %fileset.fileset_status,
                stale_only,
                "Purging fileset"
            );
            // Mark DELETED first so the lifecycle row survives a crash
            // between the save and the physical delete
            if fileset.fileset_status != FilesetStatus::Deleted {
                fileset.fileset_status = FilesetStateMachine::transition(
                    fileset.fileset_status,
                    FilesetStatus::Deleted,
                )?;
                fileset.touch(system::SCHEDULER_USER);
                self.store.save_fileset(&fileset).await?;
            }
            self.store.delete_fileset(fileset.fileset_id).await?;
            removed += 1;
        }
        Ok(removed)
    }
}

fn cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now - ChronoDuration::from_std(window).unwrap_or_else(|_| ChronoDuration::days(36500))
}

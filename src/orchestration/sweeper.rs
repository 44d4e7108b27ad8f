//! # Retry/Replay Sweeper
//!
//! Periodic recovery for sagas that stopped making progress: a crash between
//! committing a step and publishing its outcome, a dropped bus message, or a
//! consumer that died mid-stream. The sweeper reads active sagas whose
//! `update_date` is older than the grace period, bumps their retry count, and
//! asks the orchestrator to replay them. Replay re-derives the lost event
//! from the saga's own event log, so the sweeper needs no memory of its own.
//!
//! Each pass is capped at `sweeper_batch_cap` sagas. A saga that keeps
//! failing keeps being retried; there is no dead-letter state, only an
//! escalating retry count surfaced in the logs.

use crate::config::CollectionConfig;
use crate::error::Result;
use crate::orchestration::SagaOrchestrator;
use crate::persistence::SagaStore;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct SagaSweeper {
    orchestrator: Arc<SagaOrchestrator>,
    saga_store: Arc<dyn SagaStore>,
    grace_period: Duration,
    batch_cap: usize,
    interval: Duration,
}

/// What one sweep pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepSummary {
    pub examined: usize,
    pub replayed: usize,
    pub failed: usize,
}

impl SagaSweeper {
    pub fn new(
        orchestrator: Arc<SagaOrchestrator>,
        saga_store: Arc<dyn SagaStore>,
        config: &CollectionConfig,
    ) -> Self {
        Self {
            orchestrator,
            saga_store,
            grace_period: config.sweeper_grace_period,
            batch_cap: config.sweeper_batch_cap,
            interval: config.sweeper_interval,
        }
    }

    /// Run sweeps forever at the configured interval.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_ms = self.interval.as_millis() as u64, "Saga sweeper running");
        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(summary) if summary.replayed > 0 || summary.failed > 0 => {
                    info!(
                        examined = summary.examined,
                        replayed = summary.replayed,
                        failed = summary.failed,
                        "Sweep pass finished"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Sweep pass failed"),
            }
        }
    }

    /// One sweep pass: replay every active saga idle past the grace period.
    ///
    /// Per-saga failures are logged and counted, never propagated; one broken
    /// saga must not shadow the rest of the batch.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepSummary> {
        let grace = ChronoDuration::from_std(self.grace_period)
            .unwrap_or_else(|_| ChronoDuration::seconds(120));
        let cutoff = Utc::now() - grace;

        let candidates = self.saga_store.stalled_sagas(self.batch_cap).await?;
        let mut summary = SweepSummary::default();

        for mut saga in candidates {
            // stalled_sagas returns every active saga oldest-first; the
            // grace check happens here
            if saga.update_date > cutoff {
                continue;
            }
            summary.examined += 1;

            saga.retry_count += 1;
            saga.touch();
            if let Err(e) = self.saga_store.save_saga(&saga).await {
                error!(
                    saga_id = %saga.saga_id,
                    saga_name = %saga.saga_name,
                    error = %e,
                    "Retry bookkeeping failed"
                );
                summary.failed += 1;
                continue;
            }

            if saga.retry_count > 3 {
                warn!(
                    saga_id = %saga.saga_id,
                    saga_name = %saga.saga_name,
                    retry_count = saga.retry_count,
                    "Saga keeps stalling"
                );
            }

            match self.orchestrator.replay_saga(&saga).await {
                Ok(()) => {
                    debug!(
                        saga_id = %saga.saga_id,
                        saga_name = %saga.saga_name,
                        retry_count = saga.retry_count,
                        "Replayed stalled saga"
                    );
                    summary.replayed += 1;
                }
                Err(e) => {
                    error!(
                        saga_id = %saga.saga_id,
                        saga_name = %saga.saga_name,
                        error = %e,
                        "Replay failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

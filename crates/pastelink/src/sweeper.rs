//! Retention sweeper: deletes artifacts once they reach `max_age`.
//!
//! A single tokio task ticks every `sweep_interval`, first tick immediately.
//! Each cycle runs on the blocking pool so store I/O stays off the async
//! workers. Cancelling the token stops the task after the current cycle.

use std::sync::Arc;
use std::time::Duration;

use cas::ArtifactStore;
use pasteconf::RetentionConfig;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&RetentionConfig::default())
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            max_age: config.max_age(),
            sweep_interval: config.sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepPhase {
    #[default]
    Idle,
    Scanning,
    Deleting,
}

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Expired ids found.
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Run one sweep cycle.
pub fn sweep_once(store: &dyn ArtifactStore, max_age: Duration) -> SweepReport {
    sweep_with_phase(store, max_age, |_| {})
}

fn sweep_with_phase(
    store: &dyn ArtifactStore,
    max_age: Duration,
    publish: impl Fn(SweepPhase),
) -> SweepReport {
    let mut report = SweepReport::default();

    publish(SweepPhase::Scanning);
    let expired = match store.list_ids_older_than(max_age) {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "failed to list expired artifacts");
            publish(SweepPhase::Idle);
            return report;
        }
    };
    report.scanned = expired.len();

    publish(SweepPhase::Deleting);
    for id in &expired {
        match store.delete(id) {
            Ok(()) => {
                tracing::debug!(artifact.id = %id, "deleted expired artifact");
                report.deleted += 1;
            }
            Err(e) => {
                tracing::warn!(artifact.id = %id, error = %e, "failed to delete expired artifact");
                report.failed += 1;
            }
        }
    }
    publish(SweepPhase::Idle);

    tracing::info!(
        scanned = report.scanned,
        removed = report.deleted,
        failed = report.failed,
        "sweep complete"
    );
    report
}

/// Cloneable read side of a running sweeper.
#[derive(Debug, Clone)]
pub struct SweeperStatus {
    phase: watch::Receiver<SweepPhase>,
    last_report: watch::Receiver<Option<SweepReport>>,
}

impl SweeperStatus {
    pub fn phase(&self) -> SweepPhase {
        *self.phase.borrow()
    }

    /// Report of the most recently finished cycle.
    pub fn last_report(&self) -> Option<SweepReport> {
        *self.last_report.borrow()
    }

    /// Receiver that changes whenever a cycle finishes.
    pub fn reports(&self) -> watch::Receiver<Option<SweepReport>> {
        self.last_report.clone()
    }
}

#[derive(Debug)]
pub struct SweeperHandle {
    status: SweeperStatus,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn status(&self) -> SweeperStatus {
        self.status.clone()
    }

    pub fn phase(&self) -> SweepPhase {
        self.status.phase()
    }

    pub fn last_report(&self) -> Option<SweepReport> {
        self.status.last_report()
    }

    /// Wait for the task to stop. Cancel its token first.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

/// Shortest period the background task will tick at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

pub struct Sweeper;

impl Sweeper {
    pub fn spawn(
        store: Arc<dyn ArtifactStore>,
        policy: RetentionPolicy,
        cancel: CancellationToken,
    ) -> SweeperHandle {
        let (phase_tx, phase_rx) = watch::channel(SweepPhase::Idle);
        let (report_tx, report_rx) = watch::channel(None);
        let phase_tx = Arc::new(phase_tx);

        let period = policy.sweep_interval.max(MIN_SWEEP_INTERVAL);
        if period != policy.sweep_interval {
            tracing::warn!(
                requested_ms = policy.sweep_interval.as_millis() as u64,
                using_ms = period.as_millis() as u64,
                "sweep interval too short, clamping"
            );
        }

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                max_age_secs = policy.max_age.as_secs(),
                interval_secs = policy.sweep_interval.as_secs(),
                "sweeper started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!("sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let store = store.clone();
                        let phase = phase_tx.clone();
                        let cycle = tokio::task::spawn_blocking(move || {
                            sweep_with_phase(store.as_ref(), policy.max_age, |p| {
                                phase.send_replace(p);
                            })
                        });

                        match cycle.await {
                            Ok(report) => {
                                report_tx.send_replace(Some(report));
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "sweep cycle panicked");
                                phase_tx.send_replace(SweepPhase::Idle);
                            }
                        }
                    }
                }
            }
        });

        SweeperHandle {
            status: SweeperStatus {
                phase: phase_rx,
                last_report: report_rx,
            },
            task,
        }
    }
}

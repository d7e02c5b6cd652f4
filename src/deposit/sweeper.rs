//! Expiry Sweeper
//!
//! Background task that expires stale unpaid deposits. It only selects
//! candidates; every status change goes through the lifecycle engine, so a
//! payment that wins the lock first simply turns the expiry into a no-op.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::engine::LifecycleEngine;
use super::error::DepositError;
use super::types::{DepositEvent, EventSource};
use crate::config::DepositConfig;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    /// Maximum deposits expired per pass
    pub batch_size: usize,
    /// Extra time granted to WaitingConfirmation deposits
    pub waiting_grace: chrono::Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 100,
            waiting_grace: chrono::Duration::minutes(60),
        }
    }
}

impl From<&DepositConfig> for SweeperConfig {
    fn from(c: &DepositConfig) -> Self {
        Self {
            interval: c.sweep_interval(),
            batch_size: c.sweep_batch_size,
            waiting_grace: c.waiting_grace(),
        }
    }
}

/// Summary of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub candidates: usize,
    pub expired: usize,
    pub failed: usize,
}

pub struct ExpirySweeper {
    engine: Arc<LifecycleEngine>,
    config: SweeperConfig,
}

impl ExpirySweeper {
    pub fn new(engine: Arc<LifecycleEngine>, config: SweeperConfig) -> Self {
        Self { engine, config }
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            grace_minutes = self.config.waiting_grace.num_minutes(),
            "Starting expiry sweeper"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "Expiry sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Expiry sweeper stopped");
    }

    /// One selection-and-expire pass.
    pub async fn sweep_once(&self) -> Result<SweepReport, DepositError> {
        let now = self.engine.clock().now();
        let due = self
            .engine
            .store()
            .find_sweepable(now, self.config.waiting_grace, self.config.batch_size)
            .await?;

        let mut report = SweepReport {
            candidates: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            debug!("No deposits due for expiry");
            return Ok(report);
        }

        for code in &due {
            match self
                .engine
                .apply_event(code, DepositEvent::ExpiryTimeout, EventSource::Sweeper)
                .await
            {
                Ok(outcome) if outcome.applied => report.expired += 1,
                Ok(outcome) => {
                    debug!(
                        contract_code = %code,
                        status = %outcome.status,
                        "Expiry absorbed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(contract_code = %code, error = %e, "Failed to expire deposit");
                }
            }
        }

        info!(
            candidates = report.candidates,
            expired = report.expired,
            failed = report.failed,
            "Expiry sweep finished"
        );
        Ok(report)
    }
}

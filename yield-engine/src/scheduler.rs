//! Background accrual sweep
//!
//! Polls once a minute and runs the accrual sweep when a new cycle
//! boundary has been crossed. The cycle id derives from wall-clock time,
//! so restarts never double-credit a cycle that already ran.

use crate::accrual::AccrualLedger;
use crate::types::CycleId;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Scheduler driving [`AccrualLedger::run_cycle`]
pub struct AccrualScheduler {
    accruals: Arc<AccrualLedger>,
    last_completed: RwLock<Option<CycleId>>,
}

impl std::fmt::Debug for AccrualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccrualScheduler").finish()
    }
}

impl AccrualScheduler {
    /// Create a scheduler over an accrual ledger
    pub fn new(accruals: Arc<AccrualLedger>) -> Self {
        Self {
            accruals,
            last_completed: RwLock::new(None),
        }
    }

    /// Run the sweep loop forever
    pub async fn start(self: Arc<Self>) {
        info!("starting yield accrual scheduler");
        let mut ticker = tokio::time::interval(tokio::time::Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// Run the sweep once if a new cycle has started
    pub async fn tick(&self) {
        let now = Utc::now();
        let cycle = CycleId::at(now, self.accruals.config().cycle_hours);

        if *self.last_completed.read().await == Some(cycle) {
            debug!(%cycle, "cycle already swept");
            return;
        }

        let report = self.accruals.run_cycle(cycle, now).await;
        *self.last_completed.write().await = Some(cycle);
        debug!(%cycle, credited = report.credited, "sweep finished");
    }
}

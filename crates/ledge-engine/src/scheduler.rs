use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use crate::sweep::SweepRunner;

/// Spawn the periodic sweep. The first tick fires immediately, then every
/// `interval`. A failed sweep is logged and the next tick is the retry;
/// the task itself never exits.
pub fn start_sweep_scheduler(
    runner: Arc<SweepRunner>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match runner.run_sweep(Utc::now()) {
                Ok(report) => info!(
                    created = report.created,
                    suppressed = report.suppressed,
                    skipped = report.skipped,
                    "scheduled sweep finished"
                ),
                Err(e) => error!(error = %e, "scheduled sweep failed"),
            }
        }
    })
}

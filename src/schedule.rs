//! Recurring pipeline runs.
//!
//! The cadence comes from `[github].fetch_schedule`. The first run fires
//! immediately; a run that overlaps the next tick delays it rather than
//! bursting to catch up. A shutdown signal stops the loop between runs,
//! never in the middle of one.

use std::future::Future;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::Config;
use crate::error::RunError;
use crate::pipeline::{self, RunSummary, Trigger};
use crate::store::Store;

/// Run the pipeline once per interval until `shutdown` completes.
pub async fn run_schedule(
    config: Arc<Config>,
    store: Arc<dyn Store>,
    shutdown: impl Future<Output = ()>,
) {
    let schedule = config.github.fetch_schedule;
    let period = schedule.interval();
    info!(%schedule, period_secs = period.as_secs(), "schedule started");

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("schedule stopped");
                return;
            }
            _ = ticker.tick() => {}
        }
        run_scheduled_once(&config, store.clone()).await;
    }
}

/// One scheduled tick. Returns `None` when the run was skipped or failed
/// to start; the reason is logged.
pub async fn run_scheduled_once(config: &Config, store: Arc<dyn Store>) -> Option<RunSummary> {
    match pipeline::run_from_config(config, store, Trigger::Scheduled).await {
        Ok(summary) => Some(summary),
        Err(RunError::AlreadyRunning) => {
            info!("previous run still holds the lock; skipping this tick");
            None
        }
        Err(e) => {
            error!(error = %e, "scheduled run failed to start");
            None
        }
    }
}

// src/scheduler.rs
//! Continuous mode: one batch per interval, retention cleanup in between.
//!
//! Shutdown is graceful and only ever lands between batches; an in-flight
//! batch always runs to completion first.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::INTERVAL_FLOOR_SECS;
use crate::pipeline::Pipeline;
use crate::store::RunStatus;

/// Runs batches at `interval` (floored) until ctrl-c. A failed or errored
/// batch never stops the loop; the next interval simply retries.
pub async fn run_forever(pipeline: &mut Pipeline, interval: Duration) {
    let interval = interval.max(Duration::from_secs(INTERVAL_FLOOR_SECS));
    info!(interval_secs = interval.as_secs(), "continuous mode started");

    loop {
        match pipeline.run_batch().await {
            Ok(record) if record.status == RunStatus::Failed => {
                warn!(run_id = record.id, "batch failed, retrying on next interval");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "batch errored, retrying on next interval");
            }
        }
        pipeline.cleanup().await;

        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown_signal() => {
                info!("shutdown requested, stopping between batches");
                return;
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = ?e, "ctrl-c handler unavailable, running until killed");
        std::future::pending::<()>().await;
    }
}

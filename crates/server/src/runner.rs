//! Background evaluation loop.
//!
//! Spawns a tokio task that waits out the configured trigger (fixed
//! interval or cron schedule) and runs one evaluation pass per tick.
//! Ticks never overlap: the next wait starts only after the pass
//! completes, and a slow pass simply delays the next one.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::info;

use labwatch_alert::{EvaluationCycle, Trigger};

pub fn spawn_evaluation_loop(cycle: Arc<EvaluationCycle>, trigger: Trigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(trigger = %trigger, "evaluation loop started");

        loop {
            let wait = trigger.next_wait(Utc::now());
            tokio::time::sleep(wait).await;

            let summary = cycle.run(Utc::now()).await;
            info!(
                rules_evaluated = summary.rules_evaluated,
                rules_muted = summary.rules_muted,
                resources_checked = summary.resources_checked,
                alerts_opened = summary.alerts_opened,
                errors = summary.errors,
                "evaluation cycle complete"
            );
        }
    })
}

//! One evaluation pass over all enabled rules.
//!
//! The cycle is invoked by an external trigger (see [`crate::ticker`])
//! and can equally be called directly with a supplied `now`, which is
//! how the tests drive it without a live clock. Failures are contained:
//! a missing sample skips one resource, a failing rule skips one rule,
//! and neither aborts the pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use labwatch_core::{Alert, LabwatchError, ThresholdRule};

use crate::condition;
use crate::lifecycle::AlertLifecycle;
use crate::sources::{MetricSource, OpenOutcome, RuleStore, ServerRegistry};

/// Receives alerts the moment they are opened. Implemented by the
/// notification dispatcher; injected so the cycle does not know about
/// delivery at all.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert_opened(&self, alert: &Alert);
}

/// Counters for one completed pass, for logs and the manual-evaluate
/// endpoint. Background failures are observable here and in tracing
/// output rather than surfaced per-tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub rules_evaluated: usize,
    pub rules_muted: usize,
    pub resources_checked: usize,
    pub alerts_opened: usize,
    pub errors: usize,
}

/// Orchestrates one pass: rules → target servers → samples → condition
/// → lifecycle transitions → sink.
pub struct EvaluationCycle {
    rules: Arc<dyn RuleStore>,
    metrics: Arc<dyn MetricSource>,
    servers: Arc<dyn ServerRegistry>,
    lifecycle: Arc<AlertLifecycle>,
    sink: Arc<dyn AlertSink>,
    /// Bound on concurrent per-resource fetches within one rule.
    concurrency: usize,
}

impl EvaluationCycle {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        metrics: Arc<dyn MetricSource>,
        servers: Arc<dyn ServerRegistry>,
        lifecycle: Arc<AlertLifecycle>,
        sink: Arc<dyn AlertSink>,
        concurrency: usize,
    ) -> Self {
        Self {
            rules,
            metrics,
            servers,
            lifecycle,
            sink,
            concurrency: concurrency.max(1),
        }
    }

    /// Run one complete pass at the given instant.
    pub async fn run(&self, now: DateTime<Utc>) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let rules = match self.rules.list_enabled_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                error!(error = %e, "rule store unavailable, skipping evaluation pass");
                summary.errors += 1;
                return summary;
            }
        };

        for rule in &rules {
            if rule.is_muted(now) {
                debug!(rule_id = %rule.id, until = ?rule.muted_until, "rule muted, skipping");
                summary.rules_muted += 1;
                continue;
            }

            match self.evaluate_rule(rule, now).await {
                Ok((checked, opened, errors)) => {
                    summary.rules_evaluated += 1;
                    summary.resources_checked += checked;
                    summary.alerts_opened += opened;
                    summary.errors += errors;
                }
                Err(e) => {
                    // One rule's failure never prevents the rest of the pass.
                    warn!(rule_id = %rule.id, error = %e, "rule evaluation failed");
                    summary.errors += 1;
                }
            }
        }

        debug!(
            rules = summary.rules_evaluated,
            muted = summary.rules_muted,
            resources = summary.resources_checked,
            opened = summary.alerts_opened,
            errors = summary.errors,
            "evaluation pass complete"
        );
        summary
    }

    /// Evaluate one rule against its target set.
    ///
    /// Returns (resources checked, alerts opened, soft errors).
    async fn evaluate_rule(
        &self,
        rule: &ThresholdRule,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize, usize), LabwatchError> {
        let targets: Vec<Uuid> = match rule.server_id {
            Some(server_id) => vec![server_id],
            None => self.servers.list_server_ids().await?,
        };

        // Metric fetches are read-only and independent; run them with
        // bounded concurrency. All alert writes happen afterwards through
        // the lifecycle manager's atomic open.
        let samples: Vec<(Uuid, Result<Option<f64>, LabwatchError>)> = stream::iter(targets)
            .map(|server_id| {
                let metrics = self.metrics.clone();
                let metric = rule.metric.clone();
                async move { (server_id, metrics.latest(server_id, &metric).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut checked = 0;
        let mut opened = 0;
        let mut errors = 0;

        for (server_id, sample) in samples {
            let value = match sample {
                Ok(Some(value)) => value,
                Ok(None) => {
                    // Expected during agent churn; not worth a warn.
                    debug!(
                        rule_id = %rule.id,
                        server_id = %server_id,
                        metric = %rule.metric,
                        "no sample available, skipping resource"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        rule_id = %rule.id,
                        server_id = %server_id,
                        metric = %rule.metric,
                        error = %e,
                        "metric fetch failed, skipping resource"
                    );
                    errors += 1;
                    continue;
                }
            };

            checked += 1;

            if !condition::evaluate(rule.operator, value, rule.threshold) {
                // Condition clear: open alerts stay open. Resolution is
                // an explicit operator action so the incident window
                // stays visible after transient spikes.
                continue;
            }

            match self.lifecycle.open(rule, Some(server_id), value, now).await {
                Ok(OpenOutcome::Opened(alert)) => {
                    opened += 1;
                    self.sink.alert_opened(&alert).await;
                }
                Ok(OpenOutcome::AlreadyOpen(_)) => {
                    // Idempotent re-trigger: no new alert, no re-dispatch.
                }
                Err(e) => {
                    warn!(
                        rule_id = %rule.id,
                        server_id = %server_id,
                        error = %e,
                        "failed to open alert"
                    );
                    errors += 1;
                }
            }
        }

        Ok((checked, opened, errors))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

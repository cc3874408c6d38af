//! Alert lifecycle operations.
//!
//! Owns the alert state machine (open → acknowledged/resolved, with
//! snooze as an orthogonal time-boxed attribute) and enforces the
//! at-most-one-open-alert-per-rule-per-resource invariant by funnelling
//! every open attempt through the store's atomic `open_if_absent`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use labwatch_core::{Alert, LabwatchError, ThresholdRule};

use crate::sources::{AlertStore, OpenOutcome, RuleStore};

/// Per-alert result of a bulk operation. Bulk operations are atomic
/// per-alert, not as a batch: failures are reported, never rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct BulkItemResult {
    pub alert_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Manages alert state transitions over pluggable persistence.
pub struct AlertLifecycle {
    alerts: Arc<dyn AlertStore>,
    rules: Arc<dyn RuleStore>,
}

impl AlertLifecycle {
    pub fn new(alerts: Arc<dyn AlertStore>, rules: Arc<dyn RuleStore>) -> Self {
        Self { alerts, rules }
    }

    /// Open an alert for (rule, server) unless one is already open.
    ///
    /// Idempotent: a second call while the slot is occupied returns
    /// `OpenOutcome::AlreadyOpen` with the existing alert and is not an
    /// error, so overlapping evaluation cycles stay safe.
    pub async fn open(
        &self,
        rule: &ThresholdRule,
        server_id: Option<Uuid>,
        metric_value: f64,
        now: DateTime<Utc>,
    ) -> Result<OpenOutcome, LabwatchError> {
        let candidate = Alert {
            id: Uuid::new_v4(),
            rule_id: Some(rule.id),
            server_id,
            message: format!(
                "{}: {} {} {} (observed {})",
                rule.name,
                rule.metric,
                rule.operator.as_str(),
                rule.threshold,
                metric_value
            ),
            severity: rule.severity,
            metric_value,
            triggered_at: now,
            acknowledged_at: None,
            resolved_at: None,
            snoozed_until: None,
        };

        let outcome = self.alerts.open_if_absent(candidate).await?;
        match &outcome {
            OpenOutcome::Opened(alert) => {
                info!(
                    alert_id = %alert.id,
                    rule_id = %rule.id,
                    server_id = ?server_id,
                    value = metric_value,
                    severity = rule.severity.as_str(),
                    "alert opened"
                );
            }
            OpenOutcome::AlreadyOpen(alert) => {
                debug!(
                    alert_id = %alert.id,
                    rule_id = %rule.id,
                    server_id = ?server_id,
                    "alert already open, re-trigger ignored"
                );
            }
        }
        Ok(outcome)
    }

    pub async fn acknowledge(&self, alert_id: Uuid) -> Result<Alert, LabwatchError> {
        let alert = self.alerts.acknowledge(alert_id, Utc::now()).await?;
        info!(alert_id = %alert_id, "alert acknowledged");
        Ok(alert)
    }

    pub async fn resolve(&self, alert_id: Uuid) -> Result<Alert, LabwatchError> {
        let alert = self.alerts.resolve(alert_id, Utc::now()).await?;
        info!(alert_id = %alert_id, "alert resolved");
        Ok(alert)
    }

    /// Snooze delivery for `minutes`. `0` is the defined
    /// "unsnooze immediately" signal and clears `snoozed_until`.
    pub async fn snooze(&self, alert_id: Uuid, minutes: u32) -> Result<Alert, LabwatchError> {
        let until = if minutes == 0 {
            None
        } else {
            Some(Utc::now() + Duration::minutes(minutes as i64))
        };
        let alert = self.alerts.set_snoozed_until(alert_id, until).await?;
        info!(alert_id = %alert_id, minutes, "alert snooze updated");
        Ok(alert)
    }

    /// Acknowledge every currently open alert. Partial success: each
    /// alert's transition is independent.
    pub async fn acknowledge_all(&self) -> Result<Vec<BulkItemResult>, LabwatchError> {
        let open = self.alerts.list_open().await?;
        let mut results = Vec::with_capacity(open.len());
        for alert in open {
            let outcome = self.alerts.acknowledge(alert.id, Utc::now()).await;
            results.push(BulkItemResult {
                alert_id: alert.id,
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            });
        }
        Ok(results)
    }

    /// Resolve every currently open alert. Partial success as above.
    pub async fn resolve_all(&self) -> Result<Vec<BulkItemResult>, LabwatchError> {
        let open = self.alerts.list_open().await?;
        let mut results = Vec::with_capacity(open.len());
        for alert in open {
            let outcome = self.alerts.resolve(alert.id, Utc::now()).await;
            results.push(BulkItemResult {
                alert_id: alert.id,
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            });
        }
        Ok(results)
    }

    /// Mute a rule for `minutes` (`0` unmutes). Writes through the rule
    /// store; existing open alerts are untouched.
    pub async fn mute_rule(&self, rule_id: Uuid, minutes: u32) -> Result<(), LabwatchError> {
        let until = if minutes == 0 {
            None
        } else {
            Some(Utc::now() + Duration::minutes(minutes as i64))
        };
        self.rules.update_muted_until(rule_id, until).await?;
        info!(rule_id = %rule_id, minutes, "rule mute updated");
        Ok(())
    }

    pub async fn get(&self, alert_id: Uuid) -> Result<Option<Alert>, LabwatchError> {
        self.alerts.get(alert_id).await
    }

    pub async fn list_open(&self) -> Result<Vec<Alert>, LabwatchError> {
        self.alerts.list_open().await
    }

    pub async fn list_open_for_server(&self, server_id: Uuid) -> Result<Vec<Alert>, LabwatchError> {
        self.alerts.list_open_for_server(server_id).await
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MemoryAlertStore, MemoryRuleStore};
    use labwatch_core::{Operator, Severity};
    use tokio::sync::Mutex;

    /// Alert store that fails acknowledge/resolve for designated ids.
    struct FaultyAlertStore {
        inner: MemoryAlertStore,
        failing: Mutex<Vec<Uuid>>,
    }

    impl FaultyAlertStore {
        fn new() -> Self {
            Self {
                inner: MemoryAlertStore::new(),
                failing: Mutex::new(Vec::new()),
            }
        }

        async fn fail_on(&self, id: Uuid) {
            self.failing.lock().await.push(id);
        }

        async fn is_failing(&self, id: Uuid) -> bool {
            self.failing.lock().await.contains(&id)
        }
    }

    #[async_trait::async_trait]
    impl AlertStore for FaultyAlertStore {
        async fn open_if_absent(&self, candidate: Alert) -> Result<OpenOutcome, LabwatchError> {
            self.inner.open_if_absent(candidate).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<Alert>, LabwatchError> {
            self.inner.get(id).await
        }

        async fn acknowledge(&self, id: Uuid, now: DateTime<Utc>) -> Result<Alert, LabwatchError> {
            if self.is_failing(id).await {
                return Err(LabwatchError::Store("row lock timeout".to_string()));
            }
            self.inner.acknowledge(id, now).await
        }

        async fn resolve(&self, id: Uuid, now: DateTime<Utc>) -> Result<Alert, LabwatchError> {
            if self.is_failing(id).await {
                return Err(LabwatchError::Store("row lock timeout".to_string()));
            }
            self.inner.resolve(id, now).await
        }

        async fn set_snoozed_until(
            &self,
            id: Uuid,
            until: Option<DateTime<Utc>>,
        ) -> Result<Alert, LabwatchError> {
            self.inner.set_snoozed_until(id, until).await
        }

        async fn list_open(&self) -> Result<Vec<Alert>, LabwatchError> {
            self.inner.list_open().await
        }

        async fn list_open_for_server(&self, server_id: Uuid) -> Result<Vec<Alert>, LabwatchError> {
            self.inner.list_open_for_server(server_id).await
        }
    }

    fn make_rule() -> ThresholdRule {
        ThresholdRule {
            id: Uuid::new_v4(),
            server_id: None,
            name: "High CPU".to_string(),
            metric: "cpu_percent".to_string(),
            operator: Operator::GreaterThan,
            threshold: 90.0,
            severity: Severity::Critical,
            enabled: true,
            muted_until: None,
        }
    }

    fn make_lifecycle() -> (AlertLifecycle, Arc<MemoryRuleStore>) {
        let rules = Arc::new(MemoryRuleStore::new());
        let lifecycle = AlertLifecycle::new(Arc::new(MemoryAlertStore::new()), rules.clone());
        (lifecycle, rules)
    }

    #[tokio::test]
    async fn open_copies_rule_fields() {
        let (lifecycle, _) = make_lifecycle();
        let rule = make_rule();
        let server = Uuid::new_v4();

        let alert = match lifecycle.open(&rule, Some(server), 95.0, Utc::now()).await.unwrap() {
            OpenOutcome::Opened(a) => a,
            _ => panic!("expected Opened"),
        };

        assert_eq!(alert.rule_id, Some(rule.id));
        assert_eq!(alert.server_id, Some(server));
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.metric_value, 95.0);
        assert!(alert.message.contains("cpu_percent"));
        assert!(alert.message.contains("greater_than"));
    }

    #[tokio::test]
    async fn second_open_is_a_noop_returning_existing() {
        let (lifecycle, _) = make_lifecycle();
        let rule = make_rule();
        let server = Uuid::new_v4();
        let now = Utc::now();

        let first = lifecycle.open(&rule, Some(server), 95.0, now).await.unwrap();
        let second = lifecycle.open(&rule, Some(server), 97.0, now).await.unwrap();

        let first_id = match first {
            OpenOutcome::Opened(a) => a.id,
            _ => panic!(),
        };
        match second {
            OpenOutcome::AlreadyOpen(a) => {
                assert_eq!(a.id, first_id);
                // The original trigger value is preserved.
                assert_eq!(a.metric_value, 95.0);
            }
            OpenOutcome::Opened(_) => panic!("duplicate open"),
        }
    }

    #[tokio::test]
    async fn snooze_zero_unsnoozes_immediately() {
        let (lifecycle, _) = make_lifecycle();
        let rule = make_rule();
        let alert = match lifecycle
            .open(&rule, Some(Uuid::new_v4()), 95.0, Utc::now())
            .await
            .unwrap()
        {
            OpenOutcome::Opened(a) => a,
            _ => panic!(),
        };

        let snoozed = lifecycle.snooze(alert.id, 30).await.unwrap();
        assert!(snoozed.is_snoozed(Utc::now()));

        // Verifiable without waiting for the window to elapse.
        let unsnoozed = lifecycle.snooze(alert.id, 0).await.unwrap();
        assert_eq!(unsnoozed.snoozed_until, None);
        assert!(!unsnoozed.is_snoozed(Utc::now()));
        assert!(unsnoozed.is_open());
    }

    #[tokio::test]
    async fn acknowledge_then_resolve() {
        let (lifecycle, _) = make_lifecycle();
        let rule = make_rule();
        let alert = match lifecycle
            .open(&rule, Some(Uuid::new_v4()), 95.0, Utc::now())
            .await
            .unwrap()
        {
            OpenOutcome::Opened(a) => a,
            _ => panic!(),
        };

        let acked = lifecycle.acknowledge(alert.id).await.unwrap();
        assert!(acked.acknowledged_at.is_some());
        assert!(acked.is_open(), "acknowledge must not close the alert");

        let resolved = lifecycle.resolve(alert.id).await.unwrap();
        assert!(!resolved.is_open());
    }

    #[tokio::test]
    async fn resolve_without_acknowledge_is_allowed() {
        let (lifecycle, _) = make_lifecycle();
        let rule = make_rule();
        let alert = match lifecycle
            .open(&rule, Some(Uuid::new_v4()), 95.0, Utc::now())
            .await
            .unwrap()
        {
            OpenOutcome::Opened(a) => a,
            _ => panic!(),
        };

        let resolved = lifecycle.resolve(alert.id).await.unwrap();
        assert!(resolved.acknowledged_at.is_none());
        assert!(!resolved.is_open());
    }

    #[tokio::test]
    async fn bulk_acknowledge_reports_per_alert() {
        let (lifecycle, _) = make_lifecycle();
        let server = Uuid::new_v4();
        for _ in 0..3 {
            lifecycle
                .open(&make_rule(), Some(server), 95.0, Utc::now())
                .await
                .unwrap();
        }

        let results = lifecycle.acknowledge_all().await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));

        for alert in lifecycle.list_open().await.unwrap() {
            assert!(alert.acknowledged_at.is_some());
            assert!(alert.is_open());
        }
    }

    #[tokio::test]
    async fn bulk_resolve_closes_everything_open() {
        let (lifecycle, _) = make_lifecycle();
        let server = Uuid::new_v4();
        for _ in 0..3 {
            lifecycle
                .open(&make_rule(), Some(server), 95.0, Utc::now())
                .await
                .unwrap();
        }

        let results = lifecycle.resolve_all().await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));
        assert!(lifecycle.list_open().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bulk_acknowledge_partial_failure_reports_and_continues() {
        let store = Arc::new(FaultyAlertStore::new());
        let lifecycle = AlertLifecycle::new(store.clone(), Arc::new(MemoryRuleStore::new()));

        let server = Uuid::new_v4();
        let mut ids = Vec::new();
        for _ in 0..3 {
            match lifecycle
                .open(&make_rule(), Some(server), 95.0, Utc::now())
                .await
                .unwrap()
            {
                OpenOutcome::Opened(a) => ids.push(a.id),
                _ => panic!(),
            }
        }
        store.fail_on(ids[1]).await;

        let results = lifecycle.acknowledge_all().await.unwrap();
        assert_eq!(results.len(), 3);

        let failed: Vec<_> = results.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].alert_id, ids[1]);
        assert!(failed[0].error.as_ref().unwrap().contains("row lock timeout"));

        // The other alerts were still acknowledged.
        for id in [ids[0], ids[2]] {
            let alert = store.get(id).await.unwrap().unwrap();
            assert!(alert.acknowledged_at.is_some());
        }
        let untouched = store.get(ids[1]).await.unwrap().unwrap();
        assert!(untouched.acknowledged_at.is_none());
    }

    #[tokio::test]
    async fn bulk_resolve_partial_failure_leaves_failed_alert_open() {
        let store = Arc::new(FaultyAlertStore::new());
        let lifecycle = AlertLifecycle::new(store.clone(), Arc::new(MemoryRuleStore::new()));

        let server = Uuid::new_v4();
        let mut ids = Vec::new();
        for _ in 0..3 {
            match lifecycle
                .open(&make_rule(), Some(server), 95.0, Utc::now())
                .await
                .unwrap()
            {
                OpenOutcome::Opened(a) => ids.push(a.id),
                _ => panic!(),
            }
        }
        store.fail_on(ids[0]).await;

        let results = lifecycle.resolve_all().await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.success).count(), 2);

        let open = lifecycle.list_open().await.unwrap();
        assert_eq!(open.len(), 1, "only the failed alert stays open");
        assert_eq!(open[0].id, ids[0]);
    }

    #[tokio::test]
    async fn mute_rule_writes_through_rule_store() {
        let (lifecycle, rules) = make_lifecycle();
        let rule = make_rule();
        rules.insert(rule.clone()).await;

        lifecycle.mute_rule(rule.id, 60).await.unwrap();
        let muted = rules.get_rule(rule.id).await.unwrap().unwrap();
        assert!(muted.is_muted(Utc::now()));

        lifecycle.mute_rule(rule.id, 0).await.unwrap();
        let unmuted = rules.get_rule(rule.id).await.unwrap().unwrap();
        assert_eq!(unmuted.muted_until, None);
    }

    #[tokio::test]
    async fn mute_unknown_rule_is_an_error() {
        let (lifecycle, _) = make_lifecycle();
        assert!(lifecycle.mute_rule(Uuid::new_v4(), 10).await.is_err());
    }
}

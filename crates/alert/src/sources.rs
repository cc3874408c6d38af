//! Collaborator traits and in-memory implementations.
//!
//! The evaluation cycle talks to the metrics layer, the rules API, and
//! the resource registry only through these seams, so the engine can be
//! tested without a live collector and swapped onto a real persistence
//! layer without touching the cycle logic.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use labwatch_core::{Alert, LabwatchError, ThresholdRule};

// ── Collaborator traits ─────────────────────────────────────────────

/// Latest-value access to the metrics layer.
#[async_trait::async_trait]
pub trait MetricSource: Send + Sync {
    /// Most recent sampled value for a (server, metric) pair, or `None`
    /// when no sample is available.
    async fn latest(&self, server_id: Uuid, metric: &str) -> Result<Option<f64>, LabwatchError>;
}

/// Read access to persisted rules, plus the single field the evaluator
/// may write back: `muted_until`.
#[async_trait::async_trait]
pub trait RuleStore: Send + Sync {
    async fn list_enabled_rules(&self) -> Result<Vec<ThresholdRule>, LabwatchError>;

    async fn get_rule(&self, rule_id: Uuid) -> Result<Option<ThresholdRule>, LabwatchError>;

    async fn update_muted_until(
        &self,
        rule_id: Uuid,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), LabwatchError>;
}

/// Known servers, for rules with a `None` scope.
#[async_trait::async_trait]
pub trait ServerRegistry: Send + Sync {
    async fn list_server_ids(&self) -> Result<Vec<Uuid>, LabwatchError>;

    /// Display name for template rendering; `None` for unknown servers.
    async fn server_name(&self, server_id: Uuid) -> Option<String>;
}

/// Outcome of an open attempt against the unique open-alert slot.
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// A new alert was created; notifications should fire.
    Opened(Alert),
    /// The slot was already occupied; no new alert, no notification.
    AlreadyOpen(Alert),
}

/// Alert persistence.
///
/// `open_if_absent` is the one operation that needs strict atomicity:
/// the "no open alert exists for (rule, server)" check and the insert
/// must be indivisible so that overlapping cycles cannot both insert.
#[async_trait::async_trait]
pub trait AlertStore: Send + Sync {
    async fn open_if_absent(&self, candidate: Alert) -> Result<OpenOutcome, LabwatchError>;

    async fn get(&self, id: Uuid) -> Result<Option<Alert>, LabwatchError>;

    /// Set `acknowledged_at` if unset. Acknowledging a resolved or
    /// already-acknowledged alert is a no-op, not an error.
    async fn acknowledge(&self, id: Uuid, now: DateTime<Utc>) -> Result<Alert, LabwatchError>;

    /// Set `resolved_at`, freeing the (rule, server) slot. Resolving an
    /// already-resolved alert is a no-op.
    async fn resolve(&self, id: Uuid, now: DateTime<Utc>) -> Result<Alert, LabwatchError>;

    /// Overwrite `snoozed_until` (`None` clears the snooze). Snooze only
    /// exists for open alerts; on a resolved alert the write is a no-op.
    async fn set_snoozed_until(
        &self,
        id: Uuid,
        until: Option<DateTime<Utc>>,
    ) -> Result<Alert, LabwatchError>;

    async fn list_open(&self) -> Result<Vec<Alert>, LabwatchError>;

    async fn list_open_for_server(&self, server_id: Uuid) -> Result<Vec<Alert>, LabwatchError>;
}

// ── In-memory implementations ───────────────────────────────────────

/// In-memory metric table keyed by (server, metric).
#[derive(Default)]
pub struct MemoryMetricSource {
    values: Mutex<HashMap<(Uuid, String), f64>>,
}

impl MemoryMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, server_id: Uuid, metric: &str, value: f64) {
        self.values
            .lock()
            .await
            .insert((server_id, metric.to_string()), value);
    }

    pub async fn clear(&self, server_id: Uuid, metric: &str) {
        self.values
            .lock()
            .await
            .remove(&(server_id, metric.to_string()));
    }
}

#[async_trait::async_trait]
impl MetricSource for MemoryMetricSource {
    async fn latest(&self, server_id: Uuid, metric: &str) -> Result<Option<f64>, LabwatchError> {
        let values = self.values.lock().await;
        Ok(values.get(&(server_id, metric.to_string())).copied())
    }
}

/// In-memory rule table.
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: Mutex<HashMap<Uuid, ThresholdRule>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, rule: ThresholdRule) {
        self.rules.lock().await.insert(rule.id, rule);
    }

    pub async fn remove(&self, rule_id: Uuid) {
        self.rules.lock().await.remove(&rule_id);
    }
}

#[async_trait::async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_enabled_rules(&self) -> Result<Vec<ThresholdRule>, LabwatchError> {
        let rules = self.rules.lock().await;
        Ok(rules.values().filter(|r| r.enabled).cloned().collect())
    }

    async fn get_rule(&self, rule_id: Uuid) -> Result<Option<ThresholdRule>, LabwatchError> {
        Ok(self.rules.lock().await.get(&rule_id).cloned())
    }

    async fn update_muted_until(
        &self,
        rule_id: Uuid,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), LabwatchError> {
        let mut rules = self.rules.lock().await;
        let rule = rules
            .get_mut(&rule_id)
            .ok_or(LabwatchError::RuleNotFound(rule_id))?;
        rule.muted_until = until;
        Ok(())
    }
}

/// In-memory server registry (id → display name).
#[derive(Default)]
pub struct MemoryServerRegistry {
    servers: Mutex<HashMap<Uuid, String>>,
}

impl MemoryServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, server_id: Uuid, name: &str) {
        self.servers.lock().await.insert(server_id, name.to_string());
    }
}

#[async_trait::async_trait]
impl ServerRegistry for MemoryServerRegistry {
    async fn list_server_ids(&self) -> Result<Vec<Uuid>, LabwatchError> {
        Ok(self.servers.lock().await.keys().copied().collect())
    }

    async fn server_name(&self, server_id: Uuid) -> Option<String> {
        self.servers.lock().await.get(&server_id).cloned()
    }
}

/// In-memory alert table.
///
/// All operations take the single table lock, so the open-slot scan and
/// insert inside `open_if_absent` are indivisible. This is the
/// in-memory analogue of a partial unique index on (rule_id, server_id)
/// where resolved_at is null.
#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: Mutex<HashMap<Uuid, Alert>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored alerts, open or resolved.
    pub async fn len(&self) -> usize {
        self.alerts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl AlertStore for MemoryAlertStore {
    async fn open_if_absent(&self, candidate: Alert) -> Result<OpenOutcome, LabwatchError> {
        let mut alerts = self.alerts.lock().await;
        let existing = alerts
            .values()
            .find(|a| {
                a.is_open()
                    && a.rule_id == candidate.rule_id
                    && a.server_id == candidate.server_id
            })
            .cloned();

        if let Some(existing) = existing {
            return Ok(OpenOutcome::AlreadyOpen(existing));
        }

        alerts.insert(candidate.id, candidate.clone());
        Ok(OpenOutcome::Opened(candidate))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Alert>, LabwatchError> {
        Ok(self.alerts.lock().await.get(&id).cloned())
    }

    async fn acknowledge(&self, id: Uuid, now: DateTime<Utc>) -> Result<Alert, LabwatchError> {
        let mut alerts = self.alerts.lock().await;
        let alert = alerts.get_mut(&id).ok_or(LabwatchError::AlertNotFound(id))?;
        if alert.acknowledged_at.is_none() && alert.is_open() {
            alert.acknowledged_at = Some(now);
        }
        Ok(alert.clone())
    }

    async fn resolve(&self, id: Uuid, now: DateTime<Utc>) -> Result<Alert, LabwatchError> {
        let mut alerts = self.alerts.lock().await;
        let alert = alerts.get_mut(&id).ok_or(LabwatchError::AlertNotFound(id))?;
        if alert.resolved_at.is_none() {
            alert.resolved_at = Some(now);
        }
        Ok(alert.clone())
    }

    async fn set_snoozed_until(
        &self,
        id: Uuid,
        until: Option<DateTime<Utc>>,
    ) -> Result<Alert, LabwatchError> {
        let mut alerts = self.alerts.lock().await;
        let alert = alerts.get_mut(&id).ok_or(LabwatchError::AlertNotFound(id))?;
        if alert.is_open() {
            alert.snoozed_until = until;
        }
        Ok(alert.clone())
    }

    async fn list_open(&self) -> Result<Vec<Alert>, LabwatchError> {
        let alerts = self.alerts.lock().await;
        let mut open: Vec<Alert> = alerts.values().filter(|a| a.is_open()).cloned().collect();
        open.sort_by_key(|a| a.triggered_at);
        Ok(open)
    }

    async fn list_open_for_server(&self, server_id: Uuid) -> Result<Vec<Alert>, LabwatchError> {
        let alerts = self.alerts.lock().await;
        let mut open: Vec<Alert> = alerts
            .values()
            .filter(|a| a.is_open() && a.server_id == Some(server_id))
            .cloned()
            .collect();
        open.sort_by_key(|a| a.triggered_at);
        Ok(open)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

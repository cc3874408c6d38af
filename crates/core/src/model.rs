//! Domain model for threshold alerting.
//!
//! Plain serde structs shared across the workspace: rules, alerts, and
//! notification channels. Persistence lives behind store traits in the
//! `labwatch-alert` crate; these types carry no storage concerns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Enums ───────────────────────────────────────────────────────────

/// Comparison operator for a threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    GreaterThan,
    LessThan,
    EqualTo,
}

impl Operator {
    /// Wire name as used in rule definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::EqualTo => "equal_to",
        }
    }
}

/// Alert severity, copied from the rule at trigger time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

// ── Threshold rule ──────────────────────────────────────────────────

/// A persisted single-metric threshold rule.
///
/// Rules are created and edited by the rules API; the evaluator reads
/// them and only ever writes back `muted_until`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub id: Uuid,
    /// Target server; `None` scopes the rule to every known server.
    pub server_id: Option<Uuid>,
    pub name: String,
    /// Metric name as reported by the collector (e.g., "cpu_percent").
    pub metric: String,
    pub operator: Operator,
    pub threshold: f64,
    pub severity: Severity,
    pub enabled: bool,
    /// New alerts are suppressed while this is in the future. Alerts
    /// already open before the mute are unaffected.
    pub muted_until: Option<DateTime<Utc>>,
}

impl ThresholdRule {
    /// Whether the rule is muted at the given instant.
    pub fn is_muted(&self, now: DateTime<Utc>) -> bool {
        self.muted_until.is_some_and(|until| until > now)
    }
}

// ── Alert ───────────────────────────────────────────────────────────

/// An observed rule violation for one resource.
///
/// Carries its own lifecycle independent of the rule: `rule_id` goes
/// `None` if the rule is later deleted, but the alert remains for audit.
/// Invariant: at most one alert per (rule_id, server_id) pair with
/// `resolved_at == None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub rule_id: Option<Uuid>,
    pub server_id: Option<Uuid>,
    pub message: String,
    pub severity: Severity,
    /// Metric value observed at trigger time.
    pub metric_value: f64,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Suppresses notification delivery only; never the open state.
    pub snoozed_until: Option<DateTime<Utc>>,
}

impl Alert {
    /// An alert is open until an operator resolves it.
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Whether delivery is currently snoozed. Computed, not a state
    /// transition: once `snoozed_until` passes the alert behaves as
    /// un-snoozed without any write.
    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }
}

// ── Alert channel ───────────────────────────────────────────────────

/// A configured notification destination.
///
/// `config` keys are validated against the channel type's schema before
/// persistence; the dispatcher consumes channels read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertChannel {
    pub id: Uuid,
    /// Matches a `ChannelTypeDefinition` key ("webhook", "email", ...).
    pub channel_type: String,
    pub name: String,
    pub enabled: bool,
    pub config: std::collections::HashMap<String, String>,
    /// Message template with `{placeholder}` variables; `None` falls
    /// back to the channel type's default template.
    pub template: Option<String>,
}

// ── Tests ───────────────────────────────────────────────────────────

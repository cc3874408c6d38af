//! Threshold alerting engine.
//!
//! This crate provides:
//! - Pure threshold condition evaluation
//! - The rule evaluation cycle with fail-soft error containment
//! - The alert lifecycle manager (open/acknowledge/resolve/snooze/mute)
//! - Collaborator traits for the metrics, rule, and server layers, with
//!   in-memory implementations
//! - Interval and cron evaluation triggers

pub mod condition;
pub mod cycle;
pub mod lifecycle;
pub mod sources;
pub mod ticker;

pub use cycle::{AlertSink, CycleSummary, EvaluationCycle};
pub use lifecycle::{AlertLifecycle, BulkItemResult};
pub use sources::{
    AlertStore, MemoryAlertStore, MemoryMetricSource, MemoryRuleStore, MemoryServerRegistry,
    MetricSource, OpenOutcome, RuleStore, ServerRegistry,
};
pub use ticker::Trigger;

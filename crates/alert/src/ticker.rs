//! Evaluation triggers.
//!
//! The cycle itself knows nothing about wall-clock scheduling; a
//! [`Trigger`] computes how long the runner should sleep before the
//! next pass, either from a fixed interval or a cron expression. Tests
//! bypass this entirely and call `EvaluationCycle::run` directly.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::warn;

use labwatch_core::config::EvaluationConfig;
use labwatch_core::LabwatchError;

/// When the next evaluation pass should fire.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Fixed interval between passes.
    Interval(Duration),
    /// Cron-expression driven (standard 5-field, seconds normalized in).
    Cron(Box<Schedule>),
}

impl Trigger {
    pub fn interval(period: Duration) -> Self {
        Trigger::Interval(period)
    }

    /// Parse a cron expression. Standard 5-field expressions get a "0"
    /// seconds field prepended; 6-field expressions pass through.
    pub fn cron(expression: &str) -> Result<Self, LabwatchError> {
        let normalized = normalize_cron(expression);
        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| LabwatchError::Other(format!("invalid cron expression '{expression}': {e}")))?;
        Ok(Trigger::Cron(Box::new(schedule)))
    }

    /// Build from config: cron expression when set, fixed interval otherwise.
    pub fn from_config(cfg: &EvaluationConfig) -> Result<Self, LabwatchError> {
        match &cfg.cron {
            Some(expr) => Self::cron(expr),
            None => Ok(Self::interval(Duration::from_secs(cfg.interval_secs))),
        }
    }

    /// How long to sleep from `now` until the next firing.
    pub fn next_wait(&self, now: DateTime<Utc>) -> Duration {
        match self {
            Trigger::Interval(period) => *period,
            Trigger::Cron(schedule) => match schedule.after(&now).next() {
                Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
                None => {
                    // A schedule with no upcoming fire time (e.g., a
                    // fully elapsed year field). Poll again in an hour.
                    warn!("cron schedule has no upcoming fire time");
                    Duration::from_secs(3600)
                }
            },
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Interval(period) => write!(f, "every {}s", period.as_secs()),
            Trigger::Cron(schedule) => write!(f, "cron {schedule}"),
        }
    }
}

/// Normalize a 5-field cron expression to the 6-field form the `cron`
/// crate requires, by prepending a seconds field.
fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

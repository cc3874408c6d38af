use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub evaluation: EvaluationConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Seconds between evaluation cycles when no cron trigger is set.
    pub interval_secs: u64,
    /// Optional cron expression overriding the fixed interval.
    pub cron: Option<String>,
    /// Bound on concurrent per-resource metric fetches within a cycle.
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bound on concurrent channel sends for one alert.
    pub concurrency: usize,
    /// Per-channel send deadline; slower sends are recorded as failed.
    pub send_timeout_secs: u64,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("LABWATCH_HOST", "0.0.0.0"),
                port: env_u16("LABWATCH_PORT", 8090),
            },
            evaluation: EvaluationConfig {
                interval_secs: env_u64("LABWATCH_EVAL_INTERVAL_SECS", 60),
                cron: env::var("LABWATCH_EVAL_CRON").ok().filter(|s| !s.is_empty()),
                concurrency: env_usize("LABWATCH_EVAL_CONCURRENCY", 8),
            },
            dispatch: DispatchConfig {
                concurrency: env_usize("LABWATCH_DISPATCH_CONCURRENCY", 4),
                send_timeout_secs: env_u64("LABWATCH_SEND_TIMEOUT_SECS", 10),
            },
        }
    }
}

impl DispatchConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

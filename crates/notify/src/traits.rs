//! Notifier trait definition and shared error types.

use std::collections::HashMap;

use uuid::Uuid;

use labwatch_core::{AlertChannel, LabwatchError};

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Send timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// The rendered subject/title.
    pub subject: String,
    /// The rendered body content.
    pub body: String,
    /// Additional metadata (e.g., severity, alert id).
    pub metadata: HashMap<String, String>,
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Channel type key (e.g., "webhook", "email").
    fn channel_name(&self) -> &str;
}

/// Result of dispatching a notification to a single channel.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchResult {
    pub channel_id: Uuid,
    pub channel_type: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Read access to persisted alert channels. CRUD lives in the settings
/// layer; the dispatcher only consumes.
#[async_trait::async_trait]
pub trait ChannelStore: Send + Sync {
    async fn list_enabled(&self) -> Result<Vec<AlertChannel>, LabwatchError>;

    async fn get(&self, id: Uuid) -> Result<Option<AlertChannel>, LabwatchError>;
}

/// In-memory channel table.
#[derive(Default)]
pub struct MemoryChannelStore {
    channels: tokio::sync::Mutex<HashMap<Uuid, AlertChannel>>,
}

impl MemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, channel: AlertChannel) {
        self.channels.lock().await.insert(channel.id, channel);
    }

    pub async fn remove(&self, id: Uuid) {
        self.channels.lock().await.remove(&id);
    }
}

#[async_trait::async_trait]
impl ChannelStore for MemoryChannelStore {
    async fn list_enabled(&self) -> Result<Vec<AlertChannel>, LabwatchError> {
        let channels = self.channels.lock().await;
        let mut enabled: Vec<AlertChannel> =
            channels.values().filter(|c| c.enabled).cloned().collect();
        enabled.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(enabled)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AlertChannel>, LabwatchError> {
        Ok(self.channels.lock().await.get(&id).cloned())
    }
}

//! Slack incoming-webhook notifier.
//!
//! Posts the rendered message as Slack's `{"text": ...}` payload to an
//! incoming webhook URL.

use reqwest::Url;

use crate::traits::{Notification, Notifier, NotifyError};

#[derive(Debug)]
pub struct SlackNotifier {
    webhook_url: Url,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: &str) -> Result<Self, NotifyError> {
        let parsed = Url::parse(webhook_url).map_err(|e| {
            NotifyError::Config(format!("invalid slack webhook url '{webhook_url}': {e}"))
        })?;
        Ok(Self {
            webhook_url: parsed,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "text": format!("*{}*\n{}", notification.subject, notification.body),
        });

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Config(format!(
                "slack webhook returned {status}"
            )));
        }

        tracing::debug!(channel = "slack", %status, "notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}

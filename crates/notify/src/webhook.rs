//! Generic HTTP webhook notifier.
//!
//! Delivers notifications as JSON payloads to a configured URL. The URL
//! is parsed at construction time so a bad endpoint surfaces as a
//! configuration failure instead of a runtime panic.

use reqwest::Url;

use crate::traits::{Notification, Notifier, NotifyError};

/// Delivers notifications as JSON over HTTP to a configured endpoint.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: Url,
    method: reqwest::Method,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a webhook notifier. `method` defaults to `POST`; only
    /// `POST` and `PUT` are accepted.
    pub fn new(url: &str, method: Option<&str>) -> Result<Self, NotifyError> {
        let parsed_url = Url::parse(url)
            .map_err(|e| NotifyError::Config(format!("invalid webhook url '{url}': {e}")))?;

        let method = match method {
            None => reqwest::Method::POST,
            Some(m) => match m.to_uppercase().as_str() {
                "POST" => reqwest::Method::POST,
                "PUT" => reqwest::Method::PUT,
                other => {
                    return Err(NotifyError::Config(format!(
                        "unsupported webhook method: {other}"
                    )))
                }
            },
        };

        Ok(Self {
            url: parsed_url,
            method,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    /// Deliver the notification as a JSON payload.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Config(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(url = %self.url, %status, "webhook notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

//! Routes newly opened alerts to configured channels.
//!
//! The dispatcher renders each enabled channel's template and delivers
//! the message, with sends issued concurrently under a bound and a
//! per-channel timeout. Individual channel failures never block other
//! channels and never roll back the alert's open state. Dispatch
//! happens only on the open event, so re-evaluation cycles that find an
//! already-open alert cannot re-deliver.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use labwatch_alert::{AlertSink, ServerRegistry};
use labwatch_core::{Alert, AlertChannel, LabwatchError};

use crate::registry::ChannelRegistry;
use crate::template::{self, TemplateContext};
use crate::traits::{ChannelStore, DispatchResult, Notification, Notifier, NotifyError};

/// A channel send that is ready to execute.
struct PreparedSend {
    channel_id: Uuid,
    channel_type: String,
    notifier: Box<dyn Notifier>,
    notification: Notification,
}

/// Dispatches notifications for opened alerts to all enabled channels.
pub struct Dispatcher {
    channels: Arc<dyn ChannelStore>,
    registry: Arc<ChannelRegistry>,
    servers: Arc<dyn ServerRegistry>,
    send_timeout: Duration,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        channels: Arc<dyn ChannelStore>,
        registry: Arc<ChannelRegistry>,
        servers: Arc<dyn ServerRegistry>,
        send_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            channels,
            registry,
            servers,
            send_timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Deliver an alert to every enabled channel.
    ///
    /// Returns per-channel results. A snoozed alert suppresses delivery
    /// entirely (snooze gates notifications, not the open state).
    pub async fn dispatch(&self, alert: &Alert) -> Vec<DispatchResult> {
        if alert.is_snoozed(Utc::now()) {
            debug!(alert_id = %alert.id, until = ?alert.snoozed_until, "alert snoozed, delivery suppressed");
            return Vec::new();
        }

        let channels = match self.channels.list_enabled().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "channel store unavailable, notifications skipped");
                return Vec::new();
            }
        };

        if channels.is_empty() {
            debug!(alert_id = %alert.id, "no notification channels configured");
            return Vec::new();
        }

        let server_name = self.server_display_name(alert).await;
        let ctx = TemplateContext::from_alert(alert, &server_name);

        let mut sends = Vec::with_capacity(channels.len());
        let mut results = Vec::new();

        for channel in &channels {
            match self.prepare(channel, &ctx) {
                Ok(send) => sends.push(send),
                Err(e) => {
                    // A misconfigured channel fails by itself; the rest
                    // still deliver.
                    warn!(
                        channel_id = %channel.id,
                        channel_type = %channel.channel_type,
                        error = %e,
                        "channel configuration rejected"
                    );
                    results.push(DispatchResult {
                        channel_id: channel.id,
                        channel_type: channel.channel_type.clone(),
                        success: false,
                        error: Some(e.to_string()),
                        duration_ms: 0,
                    });
                }
            }
        }

        results.extend(self.deliver(sends).await);
        results
    }

    /// Synchronously send a sample notification through one channel.
    ///
    /// Used by UI "Test" buttons. Renders against a synthetic context
    /// and never creates or mutates any alert record, regardless of the
    /// outcome.
    pub async fn test_send(&self, channel_id: Uuid) -> Result<DispatchResult, LabwatchError> {
        let channel = self
            .channels
            .get(channel_id)
            .await?
            .ok_or(LabwatchError::ChannelNotFound(channel_id))?;

        let ctx = TemplateContext::sample();
        let send = match self.prepare(&channel, &ctx) {
            Ok(send) => send,
            Err(e) => {
                return Ok(DispatchResult {
                    channel_id: channel.id,
                    channel_type: channel.channel_type,
                    success: false,
                    error: Some(e.to_string()),
                    duration_ms: 0,
                })
            }
        };

        Ok(self.execute(send).await)
    }

    /// Render the channel's template (falling back to the type default)
    /// and build its notifier.
    fn prepare(
        &self,
        channel: &AlertChannel,
        ctx: &TemplateContext,
    ) -> Result<PreparedSend, NotifyError> {
        let notifier = self.registry.build_notifier(channel)?;

        // build_notifier has validated the type, so the definition exists.
        let template_source = channel.template.as_deref().unwrap_or_else(|| {
            self.registry
                .get(&channel.channel_type)
                .map(|d| d.default_template)
                .unwrap_or("{message}")
        });
        let body = template::render(template_source, ctx);

        Ok(PreparedSend {
            channel_id: channel.id,
            channel_type: channel.channel_type.clone(),
            notifier,
            notification: Notification {
                subject: format!("[{}] labwatch alert", ctx.severity),
                body,
                metadata: HashMap::from([
                    ("severity".to_string(), ctx.severity.clone()),
                    ("server_name".to_string(), ctx.server_name.clone()),
                ]),
            },
        })
    }

    /// Run prepared sends concurrently under the configured bound.
    async fn deliver(&self, sends: Vec<PreparedSend>) -> Vec<DispatchResult> {
        stream::iter(sends)
            .map(|send| self.execute(send))
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    /// Execute a single send under the per-channel timeout.
    async fn execute(&self, send: PreparedSend) -> DispatchResult {
        let start = std::time::Instant::now();
        let outcome = tokio::time::timeout(self.send_timeout, send.notifier.send(&send.notification)).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let error = match outcome {
            Ok(Ok(())) => {
                info!(
                    channel_id = %send.channel_id,
                    channel_type = %send.channel_type,
                    duration_ms,
                    "notification delivered"
                );
                None
            }
            Ok(Err(e)) => {
                warn!(
                    channel_id = %send.channel_id,
                    channel_type = %send.channel_type,
                    error = %e,
                    duration_ms,
                    "notification delivery failed"
                );
                Some(e.to_string())
            }
            Err(_) => {
                // Abandon the hung send; the cycle's next tick must not wait.
                let e = NotifyError::Timeout {
                    timeout_secs: self.send_timeout.as_secs(),
                };
                warn!(
                    channel_id = %send.channel_id,
                    channel_type = %send.channel_type,
                    duration_ms,
                    "notification send timed out"
                );
                Some(e.to_string())
            }
        };

        DispatchResult {
            channel_id: send.channel_id,
            channel_type: send.channel_type,
            success: error.is_none(),
            error,
            duration_ms,
        }
    }

    async fn server_display_name(&self, alert: &Alert) -> String {
        match alert.server_id {
            Some(id) => self
                .servers
                .server_name(id)
                .await
                .unwrap_or_else(|| id.to_string()),
            None => "all servers".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl AlertSink for Dispatcher {
    /// Entry point from the evaluation cycle: fire-and-record, results
    /// go to the logs.
    async fn alert_opened(&self, alert: &Alert) {
        let results = self.dispatch(alert).await;
        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!(
                alert_id = %alert.id,
                channels = results.len(),
                failed,
                "alert dispatched with channel failures"
            );
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MemoryChannelStore;
    use labwatch_alert::MemoryServerRegistry;
    use labwatch_core::Severity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct MockNotifier {
        name: &'static str,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            self.name
        }
    }

    fn dispatcher_with(channels: Arc<MemoryChannelStore>, timeout: Duration) -> Dispatcher {
        Dispatcher::new(
            channels,
            Arc::new(ChannelRegistry::builtin()),
            Arc::new(MemoryServerRegistry::new()),
            timeout,
            4,
        )
    }

    fn open_alert() -> Alert {
        Alert {
            id: Uuid::new_v4(),
            rule_id: Some(Uuid::new_v4()),
            server_id: None,
            message: "cpu_percent above 90".to_string(),
            severity: Severity::Critical,
            metric_value: 95.0,
            triggered_at: Utc::now(),
            acknowledged_at: None,
            resolved_at: None,
            snoozed_until: None,
        }
    }

    fn prepared(notifier: MockNotifier) -> PreparedSend {
        PreparedSend {
            channel_id: Uuid::new_v4(),
            channel_type: notifier.name.to_string(),
            notifier: Box::new(notifier),
            notification: Notification {
                subject: "test".to_string(),
                body: "test body".to_string(),
                metadata: HashMap::new(),
            },
        }
    }

    #[tokio::test]
    async fn deliver_reaches_all_channels() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            dispatcher_with(Arc::new(MemoryChannelStore::new()), Duration::from_secs(5));

        let sends = vec![
            prepared(MockNotifier {
                name: "a",
                send_count: count_a.clone(),
                should_fail: false,
                delay: None,
            }),
            prepared(MockNotifier {
                name: "b",
                send_count: count_b.clone(),
                should_fail: false,
                delay: None,
            }),
        ];

        let results = dispatcher.deliver(sends).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_others() {
        let ok_count = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            dispatcher_with(Arc::new(MemoryChannelStore::new()), Duration::from_secs(5));

        let sends = vec![
            prepared(MockNotifier {
                name: "fail",
                send_count: Arc::new(AtomicUsize::new(0)),
                should_fail: true,
                delay: None,
            }),
            prepared(MockNotifier {
                name: "ok",
                send_count: ok_count.clone(),
                should_fail: false,
                delay: None,
            }),
        ];

        let results = dispatcher.deliver(sends).await;
        assert_eq!(results.len(), 2);
        let by_type: HashMap<_, _> = results
            .iter()
            .map(|r| (r.channel_type.as_str(), r.success))
            .collect();
        assert_eq!(by_type["fail"], false);
        assert_eq!(by_type["ok"], true);
        assert_eq!(ok_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hung_channel_is_recorded_as_timeout() {
        let dispatcher =
            dispatcher_with(Arc::new(MemoryChannelStore::new()), Duration::from_millis(50));

        let sends = vec![prepared(MockNotifier {
            name: "slow",
            send_count: Arc::new(AtomicUsize::new(0)),
            should_fail: false,
            delay: Some(Duration::from_secs(10)),
        })];

        let results = dispatcher.deliver(sends).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(results[0].error.as_ref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn snoozed_alert_suppresses_delivery() {
        let channels = Arc::new(MemoryChannelStore::new());
        channels
            .insert(AlertChannel {
                id: Uuid::new_v4(),
                channel_type: "webhook".to_string(),
                name: "hook".to_string(),
                enabled: true,
                config: HashMap::from([(
                    "url".to_string(),
                    "https://example.invalid/hook".to_string(),
                )]),
                template: None,
            })
            .await;
        let dispatcher = dispatcher_with(channels, Duration::from_secs(1));

        let mut alert = open_alert();
        alert.snoozed_until = Some(Utc::now() + chrono::Duration::minutes(30));

        let results = dispatcher.dispatch(&alert).await;
        assert!(results.is_empty(), "snoozed alerts must not be delivered");
    }

    #[tokio::test]
    async fn no_channels_configured_is_quietly_empty() {
        let dispatcher =
            dispatcher_with(Arc::new(MemoryChannelStore::new()), Duration::from_secs(1));
        let results = dispatcher.dispatch(&open_alert()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn misconfigured_channel_fails_without_blocking() {
        let channels = Arc::new(MemoryChannelStore::new());
        channels
            .insert(AlertChannel {
                id: Uuid::new_v4(),
                channel_type: "webhook".to_string(),
                name: "broken".to_string(),
                enabled: true,
                config: HashMap::from([("url".to_string(), "not a url".to_string())]),
                template: None,
            })
            .await;
        let dispatcher = dispatcher_with(channels, Duration::from_secs(1));

        let results = dispatcher.dispatch(&open_alert()).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(results[0].error.as_ref().unwrap().contains("invalid webhook url"));
    }

    #[tokio::test]
    async fn test_send_with_invalid_url_reports_failure() {
        let channels = Arc::new(MemoryChannelStore::new());
        let channel_id = Uuid::new_v4();
        channels
            .insert(AlertChannel {
                id: channel_id,
                channel_type: "webhook".to_string(),
                name: "broken".to_string(),
                enabled: true,
                config: HashMap::from([("url".to_string(), "not a url".to_string())]),
                template: None,
            })
            .await;
        let dispatcher = dispatcher_with(channels, Duration::from_secs(1));

        // Fails cleanly: no unhandled error, no alert state anywhere.
        let result = dispatcher.test_send(channel_id).await.unwrap();
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_send_unknown_channel_is_an_error() {
        let dispatcher =
            dispatcher_with(Arc::new(MemoryChannelStore::new()), Duration::from_secs(1));
        assert!(matches!(
            dispatcher.test_send(Uuid::new_v4()).await.unwrap_err(),
            LabwatchError::ChannelNotFound(_)
        ));
    }

    #[tokio::test]
    async fn channel_template_overrides_type_default() {
        let dispatcher =
            dispatcher_with(Arc::new(MemoryChannelStore::new()), Duration::from_secs(1));
        let channel = AlertChannel {
            id: Uuid::new_v4(),
            channel_type: "webhook".to_string(),
            name: "custom".to_string(),
            enabled: true,
            config: HashMap::from([("url".to_string(), "https://example.com/hook".to_string())]),
            template: Some("CUSTOM {severity} / {server_name}".to_string()),
        };

        let ctx = TemplateContext {
            server_name: "nas-01".to_string(),
            message: "m".to_string(),
            severity: "warning".to_string(),
            metric_value: "1".to_string(),
            triggered_at: "t".to_string(),
        };
        let send = dispatcher.prepare(&channel, &ctx).unwrap();
        assert_eq!(send.notification.body, "CUSTOM warning / nas-01");
        assert_eq!(send.notification.subject, "[warning] labwatch alert");
    }
}

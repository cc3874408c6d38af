//! Shared application state handed to every request handler.

use std::sync::Arc;

use labwatch_alert::{
    AlertLifecycle, EvaluationCycle, MemoryAlertStore, MemoryMetricSource, MemoryRuleStore,
    MemoryServerRegistry,
};
use labwatch_core::Config;
use labwatch_notify::{ChannelRegistry, Dispatcher, MemoryChannelStore};

pub struct AppState {
    pub lifecycle: Arc<AlertLifecycle>,
    pub cycle: Arc<EvaluationCycle>,
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<ChannelRegistry>,
}

impl AppState {
    /// Wire the engine onto in-memory stores.
    ///
    /// Rules, servers, metrics, and channels are populated through the
    /// returned store handles; the engine only ever sees the traits.
    pub fn in_memory(config: &Config) -> (Arc<Self>, MemoryStores) {
        let rules = Arc::new(MemoryRuleStore::new());
        let metrics = Arc::new(MemoryMetricSource::new());
        let servers = Arc::new(MemoryServerRegistry::new());
        let alerts = Arc::new(MemoryAlertStore::new());
        let channels = Arc::new(MemoryChannelStore::new());

        let registry = Arc::new(ChannelRegistry::builtin());
        let dispatcher = Arc::new(Dispatcher::new(
            channels.clone(),
            registry.clone(),
            servers.clone(),
            config.dispatch.send_timeout(),
            config.dispatch.concurrency,
        ));
        let lifecycle = Arc::new(AlertLifecycle::new(alerts.clone(), rules.clone()));
        let cycle = Arc::new(EvaluationCycle::new(
            rules.clone(),
            metrics.clone(),
            servers.clone(),
            lifecycle.clone(),
            dispatcher.clone(),
            config.evaluation.concurrency,
        ));

        let state = Arc::new(Self {
            lifecycle,
            cycle,
            dispatcher,
            registry,
        });

        (
            state,
            MemoryStores {
                rules,
                metrics,
                servers,
                alerts,
                channels,
            },
        )
    }
}

/// Concrete store handles for seeding and tests.
pub struct MemoryStores {
    pub rules: Arc<MemoryRuleStore>,
    pub metrics: Arc<MemoryMetricSource>,
    pub servers: Arc<MemoryServerRegistry>,
    pub alerts: Arc<MemoryAlertStore>,
    pub channels: Arc<MemoryChannelStore>,
}

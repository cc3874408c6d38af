use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabwatchError {
    #[error("Rule not found: {0}")]
    RuleNotFound(uuid::Uuid),

    #[error("Alert not found: {0}")]
    AlertNotFound(uuid::Uuid),

    #[error("Channel not found: {0}")]
    ChannelNotFound(uuid::Uuid),

    #[error("Metric source error: {0}")]
    MetricSource(String),

    /// Backend failure inside a store implementation. The in-memory
    /// stores never produce this; it is the error surface for
    /// persistence-backed implementations of the store traits.
    #[error("Store error: {0}")]
    Store(String),

    #[error("{0}")]
    Other(String),
}

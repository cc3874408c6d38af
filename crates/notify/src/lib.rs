//! Notification delivery for labwatch alerts.
//!
//! Channel types (webhook, email, slack) live behind the [`Notifier`]
//! trait. The [`ChannelRegistry`] describes configurable types and
//! validates instance configs; the [`Dispatcher`] fans a newly opened
//! alert out to every enabled channel.

pub mod dispatcher;
pub mod email;
pub mod registry;
pub mod slack;
pub mod template;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use email::EmailNotifier;
pub use registry::{ChannelRegistry, ChannelTypeDefinition, ConfigFieldSpec, FieldKind};
pub use slack::SlackNotifier;
pub use template::{render, TemplateContext};
pub use traits::{ChannelStore, DispatchResult, MemoryChannelStore, Notification, Notifier, NotifyError};
pub use webhook::WebhookNotifier;

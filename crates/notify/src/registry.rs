//! Channel type catalogue.
//!
//! Static definitions of the available channel types: config schema,
//! description, and default message template. Loaded once at process
//! start; adding a type is a deployment-time change. The registry
//! validates channel configs before they are persisted and constructs
//! the matching notifier for the dispatcher.

use std::collections::HashMap;

use serde::Serialize;

use labwatch_core::AlertChannel;

use crate::email::EmailNotifier;
use crate::slack::SlackNotifier;
use crate::traits::{Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

// ── Schema types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Secret,
}

/// Schema for one config field of a channel type.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigFieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
    /// Closed set of accepted values, compared case-insensitively.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<&'static [&'static str]>,
}

/// Static catalogue entry for one channel type.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelTypeDefinition {
    pub key: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub fields: Vec<ConfigFieldSpec>,
    pub default_template: &'static str,
}

// ── Registry ────────────────────────────────────────────────────────

/// Immutable lookup from channel type key to its definition.
pub struct ChannelRegistry {
    types: Vec<ChannelTypeDefinition>,
}

impl ChannelRegistry {
    /// The built-in channel types: webhook, email, slack.
    pub fn builtin() -> Self {
        Self {
            types: vec![
                ChannelTypeDefinition {
                    key: "webhook",
                    display_name: "Webhook",
                    description: "POST the alert as JSON to an HTTP endpoint",
                    fields: vec![
                        ConfigFieldSpec {
                            name: "url",
                            kind: FieldKind::Text,
                            required: true,
                            default: None,
                            allowed: None,
                        },
                        ConfigFieldSpec {
                            name: "method",
                            kind: FieldKind::Text,
                            required: false,
                            default: Some("POST"),
                            allowed: Some(&["POST", "PUT"]),
                        },
                    ],
                    default_template:
                        "[{severity}] {server_name}: {message} (value {metric_value} at {triggered_at})",
                },
                ChannelTypeDefinition {
                    key: "email",
                    display_name: "Email",
                    description: "Send the alert via SMTP",
                    fields: vec![
                        ConfigFieldSpec {
                            name: "smtp_host",
                            kind: FieldKind::Text,
                            required: true,
                            default: None,
                            allowed: None,
                        },
                        ConfigFieldSpec {
                            name: "smtp_port",
                            kind: FieldKind::Number,
                            required: false,
                            default: Some("587"),
                            allowed: None,
                        },
                        ConfigFieldSpec {
                            name: "username",
                            kind: FieldKind::Text,
                            required: false,
                            default: None,
                            allowed: None,
                        },
                        ConfigFieldSpec {
                            name: "password",
                            kind: FieldKind::Secret,
                            required: false,
                            default: None,
                            allowed: None,
                        },
                        ConfigFieldSpec {
                            name: "from",
                            kind: FieldKind::Text,
                            required: true,
                            default: None,
                            allowed: None,
                        },
                        ConfigFieldSpec {
                            name: "to",
                            kind: FieldKind::Text,
                            required: true,
                            default: None,
                            allowed: None,
                        },
                    ],
                    default_template:
                        "Severity: {severity}\nServer: {server_name}\n{message}\nValue: {metric_value}\nTriggered at: {triggered_at}",
                },
                ChannelTypeDefinition {
                    key: "slack",
                    display_name: "Slack",
                    description: "Post the alert to a Slack incoming webhook",
                    fields: vec![ConfigFieldSpec {
                        name: "webhook_url",
                        kind: FieldKind::Text,
                        required: true,
                        default: None,
                        allowed: None,
                    }],
                    default_template: "[{severity}] {server_name}: {message}",
                },
            ],
        }
    }

    pub fn get(&self, key: &str) -> Option<&ChannelTypeDefinition> {
        self.types.iter().find(|t| t.key == key)
    }

    pub fn list(&self) -> &[ChannelTypeDefinition] {
        &self.types
    }

    /// Validate a channel config against its type's schema.
    ///
    /// Rejects unknown types, missing or empty required fields, fields
    /// not declared in the schema, non-numeric values for number
    /// fields, and values outside a field's allowed set.
    pub fn validate_config(
        &self,
        channel_type: &str,
        config: &HashMap<String, String>,
    ) -> Result<(), NotifyError> {
        let definition = self
            .get(channel_type)
            .ok_or_else(|| NotifyError::Config(format!("unknown channel type: {channel_type}")))?;

        for field in &definition.fields {
            let value = config.get(field.name).map(String::as_str).filter(|v| !v.is_empty());

            match value {
                None if field.required => {
                    return Err(NotifyError::Config(format!(
                        "missing required field '{}' for channel type '{channel_type}'",
                        field.name
                    )));
                }
                None => {}
                Some(value) => {
                    if field.kind == FieldKind::Number && value.parse::<f64>().is_err() {
                        return Err(NotifyError::Config(format!(
                            "field '{}' must be numeric, got '{value}'",
                            field.name
                        )));
                    }
                    if let Some(allowed) = field.allowed {
                        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
                            return Err(NotifyError::Config(format!(
                                "field '{}' must be one of {allowed:?}, got '{value}'",
                                field.name
                            )));
                        }
                    }
                }
            }
        }

        for key in config.keys() {
            if !definition.fields.iter().any(|f| f.name == key) {
                return Err(NotifyError::Config(format!(
                    "unknown field '{key}' for channel type '{channel_type}'"
                )));
            }
        }

        Ok(())
    }

    /// Construct the notifier for a channel, validating its config first.
    pub fn build_notifier(&self, channel: &AlertChannel) -> Result<Box<dyn Notifier>, NotifyError> {
        self.validate_config(&channel.channel_type, &channel.config)?;
        let config = &channel.config;

        match channel.channel_type.as_str() {
            "webhook" => {
                let notifier = WebhookNotifier::new(
                    config.get("url").map(String::as_str).unwrap_or_default(),
                    config.get("method").map(String::as_str),
                )?;
                Ok(Box::new(notifier))
            }
            "email" => {
                let port = config
                    .get("smtp_port")
                    .and_then(|p| p.parse::<u16>().ok());
                let notifier = EmailNotifier::new(
                    config.get("smtp_host").map(String::as_str).unwrap_or_default(),
                    port,
                    config.get("username").map(String::as_str),
                    config.get("password").map(String::as_str),
                    config.get("from").map(String::as_str).unwrap_or_default(),
                    config.get("to").map(String::as_str).unwrap_or_default(),
                )?;
                Ok(Box::new(notifier))
            }
            "slack" => {
                let notifier = SlackNotifier::new(
                    config.get("webhook_url").map(String::as_str).unwrap_or_default(),
                )?;
                Ok(Box::new(notifier))
            }
            other => Err(NotifyError::Config(format!("unknown channel type: {other}"))),
        }
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

//! Naive placeholder substitution for channel message templates.
//!
//! Deliberately not a template language: the variable set is fixed and
//! substitution is a single character walk. Unknown placeholders are
//! left verbatim (braces included) so a misspelled variable is visible
//! in the delivered message instead of failing silently.

use chrono::{SecondsFormat, Utc};

use labwatch_core::Alert;

/// Fixed variable set available to channel templates.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub server_name: String,
    pub message: String,
    pub severity: String,
    pub metric_value: String,
    pub triggered_at: String,
}

impl TemplateContext {
    /// Build a context from an alert and a resolved server display name.
    pub fn from_alert(alert: &Alert, server_name: &str) -> Self {
        Self {
            server_name: server_name.to_string(),
            message: alert.message.clone(),
            severity: alert.severity.as_str().to_string(),
            metric_value: format_value(alert.metric_value),
            triggered_at: alert
                .triggered_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Synthetic context used by channel "Test" buttons. Touches no
    /// alert state.
    pub fn sample() -> Self {
        Self {
            server_name: "test-server".to_string(),
            message: "Test notification from labwatch".to_string(),
            severity: "info".to_string(),
            metric_value: format_value(42.0),
            triggered_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "server_name" => Some(&self.server_name),
            "message" => Some(&self.message),
            "severity" => Some(&self.severity),
            "metric_value" => Some(&self.metric_value),
            "triggered_at" => Some(&self.triggered_at),
            _ => None,
        }
    }
}

/// Render integer-valued metrics without a trailing ".0".
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Substitute `{placeholder}` occurrences from the fixed variable set.
///
/// Unknown and unclosed placeholders pass through unchanged.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            result.push(ch);
            continue;
        }

        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            // A nested '{' cannot start a valid placeholder name.
            name.push(c);
        }

        if closed {
            match ctx.lookup(&name) {
                Some(value) => result.push_str(value),
                None => {
                    // Misspelled or unsupported variable: keep verbatim.
                    result.push('{');
                    result.push_str(&name);
                    result.push('}');
                }
            }
        } else {
            result.push('{');
            result.push_str(&name);
        }
    }

    result
}

//! Notification delivery
//!
//! Watchers hand formatted notifications to a [`NotificationSink`]; the
//! sink is an external collaborator (chat platform, webhook receiver).
//! Delivery failures must never corrupt watcher dedup state, so the sink
//! reports permission refusals distinctly from other failures.

mod logger;
mod webhook;

pub use logger::ChannelLogger;
pub use webhook::WebhookSink;

use async_trait::async_trait;
use thiserror::Error;

/// Notification delivery failure modes.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The sink refused delivery to the destination
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other delivery failure
    #[error("delivery failed: {0}")]
    Other(String),
}

/// Presentation level derived from a severity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Tier a CVSS-style score: >=9 critical, >=7 high, >=5 medium, else low.
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 5.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub severity: Severity,
    pub fields: Vec<(String, String)>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url: None,
            severity: Severity::Low,
            fields: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// Delivery seam to the chat platform.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification to a channel.
    async fn post(&self, channel: &str, notification: &Notification) -> Result<(), NotifyError>;

    /// Replace the process's displayed presence text.
    async fn set_presence(&self, text: &str) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Severity::from_score(9.8), Severity::Critical);
        assert_eq!(Severity::from_score(9.0), Severity::Critical);
        assert_eq!(Severity::from_score(8.9), Severity::High);
        assert_eq!(Severity::from_score(7.0), Severity::High);
        assert_eq!(Severity::from_score(5.0), Severity::Medium);
        assert_eq!(Severity::from_score(4.9), Severity::Low);
        assert_eq!(Severity::from_score(0.0), Severity::Low);
    }

    #[test]
    fn test_notification_builder() {
        let n = Notification::new("title", "body")
            .with_url("https://example.org")
            .with_severity(Severity::High)
            .with_field("Score", "7.5");
        assert_eq!(n.severity, Severity::High);
        assert_eq!(n.fields.len(), 1);
        assert_eq!(n.url.as_deref(), Some("https://example.org"));
    }
}

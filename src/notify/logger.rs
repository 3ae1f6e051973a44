//! Channel-mirrored status logging
//!
//! Watchers report their progress through `tracing` and, when a log channel
//! is configured, mirror the same lines there best-effort. A failed mirror
//! never fails the watcher cycle.

use super::{Notification, NotificationSink};
use std::sync::Arc;

/// Log level for mirrored lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
        }
    }
}

/// Mirrors watcher log lines to a configured channel.
#[derive(Clone)]
pub struct ChannelLogger {
    sink: Arc<dyn NotificationSink>,
    channel: Option<String>,
    context: &'static str,
}

impl ChannelLogger {
    /// Create a logger for `context` (e.g. "RSS"), mirroring to `channel`
    /// when one is configured.
    pub fn new(sink: Arc<dyn NotificationSink>, channel: Option<String>, context: &'static str) -> Self {
        Self {
            sink,
            channel,
            context,
        }
    }

    pub async fn info(&self, message: &str) {
        tracing::info!(context = self.context, "{}", message);
        self.mirror(LogLevel::Info, message).await;
    }

    pub async fn warning(&self, message: &str) {
        tracing::warn!(context = self.context, "{}", message);
        self.mirror(LogLevel::Warning, message).await;
    }

    pub async fn error(&self, message: &str) {
        tracing::error!(context = self.context, "{}", message);
        self.mirror(LogLevel::Error, message).await;
    }

    pub async fn success(&self, message: &str) {
        tracing::info!(context = self.context, "{}", message);
        self.mirror(LogLevel::Success, message).await;
    }

    async fn mirror(&self, level: LogLevel, message: &str) {
        let Some(channel) = &self.channel else {
            return;
        };
        let notification = Notification::new(
            format!("{} Log - {}", self.context, level.label()),
            message.to_string(),
        );
        if let Err(e) = self.sink.post(channel, &notification).await {
            tracing::warn!(channel, error = %e, "Failed to mirror log line to channel");
        }
    }
}

//! Sliding-window request admission control
//!
//! Each requester gets an independent window of recent request timestamps.
//! Entries older than the window are purged before every admission check,
//! so a key that stays quiet for a full window is fully reset.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Seconds the caller should wait before retrying (0 when allowed)
    pub retry_after_secs: i64,
}

/// Per-key sliding-window rate limiter.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    windows: Arc<RwLock<HashMap<String, VecDeque<DateTime<Utc>>>>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `window_secs` per key.
    pub fn new(max_requests: usize, window_secs: i64) -> Self {
        Self {
            max_requests,
            window: Duration::seconds(window_secs),
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check whether a request from `key` at `now` is admitted.
    ///
    /// On admission the timestamp is recorded. On denial, `retry_after_secs`
    /// is the ceiling of the time until the oldest in-window request ages out.
    pub async fn admit(&self, key: &str, now: DateTime<Utc>) -> Decision {
        let mut windows = self.windows.write().await;
        let history = windows.entry(key.to_string()).or_default();

        let cutoff = now - self.window;
        while history.front().is_some_and(|t| *t <= cutoff) {
            history.pop_front();
        }

        if history.len() >= self.max_requests {
            // Oldest remaining entry bounds when a slot frees up.
            let oldest = *history.front().unwrap_or(&now);
            let wait_ms = (oldest + self.window - now).num_milliseconds().max(0);
            let retry_after_secs = (wait_ms + 999) / 1000;
            return Decision {
                allowed: false,
                retry_after_secs,
            };
        }

        history.push_back(now);
        Decision {
            allowed: true,
            retry_after_secs: 0,
        }
    }
}

//! Weather-driven presence watcher
//!
//! Polls current conditions, renders a short presence string, and pushes
//! it only when the rendered text changed since the last push. The check
//! is a plain string comparison: the consumer is a low-churn status
//! display, so rendering-precision ties are deliberately suppressed.

use super::{CycleOutcome, Watcher};
use crate::fetch::{WeatherFetcher, WeatherObservation};
use crate::notify::{ChannelLogger, Notification, NotificationSink, NotifyError};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Last value pushed as presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub text: String,
    pub observed_at: DateTime<Utc>,
}

/// Remembers the last emitted presence text to suppress redundant pushes.
#[derive(Default)]
pub struct PresenceCache {
    last: RwLock<Option<PresenceSnapshot>>,
}

impl PresenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `text` differs from the last recorded value (always true
    /// before the first record).
    pub async fn should_emit(&self, text: &str) -> bool {
        match self.last.read().await.as_ref() {
            Some(snapshot) => snapshot.text != text,
            None => true,
        }
    }

    /// Overwrite the snapshot wholesale.
    pub async fn record(&self, text: &str, now: DateTime<Utc>) {
        *self.last.write().await = Some(PresenceSnapshot {
            text: text.to_string(),
            observed_at: now,
        });
    }
}

fn condition_emoji(condition: &str) -> &'static str {
    match condition {
        "Clear" => "☀️",
        "Clouds" => "☁️",
        "Rain" => "🌧️",
        "Drizzle" => "🌦️",
        "Thunderstorm" => "⛈️",
        "Snow" => "❄️",
        "Mist" | "Fog" => "🌫️",
        _ => "",
    }
}

/// Render an observation as a short presence string, e.g. "☀️ 18°C Tours".
pub fn render_presence(observation: &WeatherObservation) -> String {
    let emoji = condition_emoji(&observation.condition);
    let temp = observation.temp_c.round() as i64;
    if emoji.is_empty() {
        format!("{}°C {}", temp, observation.city)
    } else {
        format!("{} {}°C {}", emoji, temp, observation.city)
    }
}

/// Watcher keeping the displayed presence in sync with current weather.
pub struct WeatherWatcher {
    fetcher: Arc<dyn WeatherFetcher>,
    sink: Arc<dyn NotificationSink>,
    cache: PresenceCache,
    log: ChannelLogger,
    log_channel: Option<String>,
}

impl WeatherWatcher {
    pub fn new(
        fetcher: Arc<dyn WeatherFetcher>,
        sink: Arc<dyn NotificationSink>,
        log_channel: Option<String>,
    ) -> Self {
        let log = ChannelLogger::new(sink.clone(), None, "Weather");
        Self {
            fetcher,
            sink,
            cache: PresenceCache::new(),
            log,
            log_channel,
        }
    }

    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let observation = self.fetcher.fetch_current().await?;
        let text = render_presence(&observation);

        if !self.cache.should_emit(&text).await {
            return Ok(CycleOutcome::NothingNew);
        }

        match self.sink.set_presence(&text).await {
            Ok(()) => {
                self.cache.record(&text, now).await;
            }
            Err(NotifyError::PermissionDenied(e)) => return Err(Error::Permission(e)),
            Err(NotifyError::Other(e)) => return Err(Error::Notify(e)),
        }

        // Best-effort update notice to the weather log channel.
        if let Some(channel) = &self.log_channel {
            let notice = Notification::new("🔄 Mise à jour météo", text.clone())
                .with_field("Conditions", observation.description.clone())
                .with_field("Température", format!("{}°C", observation.temp_c.round() as i64));
            if let Err(e) = self.sink.post(channel, &notice).await {
                self.log
                    .warning(&format!("Impossible de poster la mise à jour météo : {}", e))
                    .await;
            }
        }

        Ok(CycleOutcome::Posted(text))
    }
}

#[async_trait]
impl Watcher for WeatherWatcher {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn cycle(&self, _force: bool) -> Result<CycleOutcome> {
        self.run_cycle(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn test_cache_emits_first_then_suppresses_ties() {
        let cache = PresenceCache::new();
        let now = Utc::now();

        assert!(cache.should_emit("☀️ 18°C Tours").await);
        cache.record("☀️ 18°C Tours", now).await;

        assert!(!cache.should_emit("☀️ 18°C Tours").await);
        assert!(cache.should_emit("🌧️ 12°C Tours").await);
    }

    #[test]
    fn test_render_presence() {
        let observation = WeatherObservation {
            temp_c: 17.6,
            condition: "Clear".to_string(),
            description: "ciel dégagé".to_string(),
            city: "Tours".to_string(),
        };
        assert_eq!(render_presence(&observation), "☀️ 18°C Tours");

        let unknown = WeatherObservation {
            condition: "Sandstorm".to_string(),
            ..observation
        };
        assert_eq!(render_presence(&unknown), "18°C Tours");
    }

    struct SequenceFetcher {
        observations: Mutex<Vec<WeatherObservation>>,
    }

    #[async_trait]
    impl WeatherFetcher for SequenceFetcher {
        async fn fetch_current(&self) -> Result<WeatherObservation> {
            let mut observations = self.observations.lock().await;
            if observations.is_empty() {
                return Err(Error::Transport("no more data".to_string()));
            }
            Ok(observations.remove(0))
        }
    }

    #[derive(Default)]
    struct PresenceSink {
        statuses: Mutex<Vec<String>>,
        posted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for PresenceSink {
        async fn post(
            &self,
            _channel: &str,
            notification: &Notification,
        ) -> std::result::Result<(), NotifyError> {
            self.posted.lock().await.push(notification.body.clone());
            Ok(())
        }

        async fn set_presence(&self, text: &str) -> std::result::Result<(), NotifyError> {
            self.statuses.lock().await.push(text.to_string());
            Ok(())
        }
    }

    fn obs(temp_c: f64) -> WeatherObservation {
        WeatherObservation {
            temp_c,
            condition: "Clouds".to_string(),
            description: "nuageux".to_string(),
            city: "Tours".to_string(),
        }
    }

    #[tokio::test]
    async fn test_identical_rendering_suppresses_update() {
        let fetcher = Arc::new(SequenceFetcher {
            // 18.2 and 18.4 render to the same text.
            observations: Mutex::new(vec![obs(18.2), obs(18.4), obs(12.0)]),
        });
        let sink = Arc::new(PresenceSink::default());
        let watcher = WeatherWatcher::new(fetcher, sink.clone(), None);

        assert!(matches!(
            watcher.cycle(false).await.unwrap(),
            CycleOutcome::Posted(_)
        ));
        assert_eq!(
            watcher.cycle(false).await.unwrap(),
            CycleOutcome::NothingNew
        );
        assert!(matches!(
            watcher.cycle(false).await.unwrap(),
            CycleOutcome::Posted(_)
        ));

        let statuses = sink.statuses.lock().await;
        assert_eq!(*statuses, ["☁️ 18°C Tours", "☁️ 12°C Tours"]);
    }

    #[tokio::test]
    async fn test_log_channel_receives_update_notice() {
        let fetcher = Arc::new(SequenceFetcher {
            observations: Mutex::new(vec![obs(18.0)]),
        });
        let sink = Arc::new(PresenceSink::default());
        let watcher = WeatherWatcher::new(fetcher, sink.clone(), Some("meteo-log".to_string()));

        watcher.cycle(false).await.unwrap();
        assert_eq!(sink.posted.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_recoverable_and_nothing_recorded() {
        let fetcher = Arc::new(SequenceFetcher {
            observations: Mutex::new(vec![]),
        });
        let sink = Arc::new(PresenceSink::default());
        let watcher = WeatherWatcher::new(fetcher, sink.clone(), None);

        assert!(watcher.cycle(false).await.is_err());
        assert!(sink.statuses.lock().await.is_empty());
        assert!(watcher.cache.should_emit("anything").await);
    }
}

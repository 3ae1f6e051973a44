//! External source fetchers
//!
//! Fetchers are black boxes behind traits: they return structured items or
//! a transport error, and report transport failures distinctly from empty
//! result sets. Everything downstream (filtering, dedup, notification) is
//! the watchers' concern.

mod cve;
mod rss;
mod weather;

pub use cve::HttpCveFetcher;
pub use rss::HttpFeedFetcher;
pub use weather::{HttpWeatherFetcher, WeatherObservation};

use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Surface client-side timeouts distinctly from other request failures.
fn request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e)
    }
}

/// A normalized external item. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchItem {
    /// Opaque identifier (article link, vulnerability ID)
    pub identifier: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    /// Which source produced the item (feed URL, API endpoint)
    pub source_ref: String,
    pub body_text: String,
}

/// Fetches normalized items from configured RSS feeds.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<WatchItem>>;
}

/// Fetches the latest vulnerability batch as raw structured payloads.
///
/// Items are kept raw because individual entries may be malformed; the
/// watcher parses them tolerantly one by one.
#[async_trait]
pub trait CveFetcher: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<serde_json::Value>>;
}

/// Fetches the current weather observation.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    async fn fetch_current(&self) -> Result<WeatherObservation>;
}

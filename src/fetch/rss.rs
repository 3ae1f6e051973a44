//! RSS feed fetcher

use super::{FeedFetcher, WatchItem};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssEntry>,
}

#[derive(Debug, Deserialize)]
struct RssEntry {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Fetches and parses a fixed list of RSS feed URLs.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl HttpFeedFetcher {
    pub fn new(urls: Vec<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client, urls }
    }

    async fn fetch_one(&self, url: &str) -> Result<Vec<WatchItem>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(super::request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("{} answered {}", url, status)));
        }
        let body = response.text().await.map_err(super::request_error)?;

        let document: RssDocument = quick_xml::de::from_str(&body)
            .map_err(|e| Error::MalformedData(format!("invalid feed at {}: {}", url, e)))?;

        let mut items = Vec::new();
        for entry in document.channel.items {
            match parse_entry(entry, url) {
                Ok(item) => items.push(item),
                Err(e) => {
                    // One bad entry never sinks the feed.
                    tracing::warn!(url, error = %e, "Skipping malformed feed entry");
                }
            }
        }
        Ok(items)
    }
}

/// Convert one feed entry to a [`WatchItem`], rejecting entries missing
/// a link or a parseable publication date.
fn parse_entry(entry: RssEntry, source_url: &str) -> Result<WatchItem> {
    let link = entry
        .link
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| Error::MalformedData("entry without link".to_string()))?;

    let pub_date = entry
        .pub_date
        .ok_or_else(|| Error::MalformedData(format!("entry {} without pubDate", link)))?;
    let published_at: DateTime<Utc> = DateTime::parse_from_rfc2822(pub_date.trim())
        .map_err(|e| Error::MalformedData(format!("bad pubDate on {}: {}", link, e)))?
        .with_timezone(&Utc);

    Ok(WatchItem {
        identifier: link.clone(),
        title: entry.title.unwrap_or_else(|| "(sans titre)".to_string()),
        published_at,
        source_ref: source_url.to_string(),
        body_text: entry.description.unwrap_or_default(),
    })
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self) -> Result<Vec<WatchItem>> {
        let mut items = Vec::new();
        let mut failures = 0usize;

        for url in &self.urls {
            match self.fetch_one(url).await {
                Ok(mut batch) => items.append(&mut batch),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(url, error = %e, "Feed fetch failed");
                }
            }
        }

        // Empty-but-reachable feeds are a valid result; all feeds failing
        // is a transport error the watcher should see.
        if !self.urls.is_empty() && failures == self.urls.len() {
            return Err(Error::Transport("all feed fetches failed".to_string()));
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test feed</title>
    <item>
      <title>Kubernetes 1.30 est disponible</title>
      <link>https://example.org/k8s-130</link>
      <pubDate>Fri, 28 Aug 2026 09:30:00 +0000</pubDate>
      <description>La nouvelle version apporte...</description>
    </item>
    <item>
      <title>Entry without link</title>
      <pubDate>Fri, 28 Aug 2026 10:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parses_entries_and_skips_malformed_ones() {
        let document: RssDocument = quick_xml::de::from_str(SAMPLE_FEED).unwrap();
        assert_eq!(document.channel.items.len(), 2);

        let parsed: Vec<_> = document
            .channel
            .items
            .into_iter()
            .filter_map(|e| parse_entry(e, "https://example.org/rss.xml").ok())
            .collect();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].identifier, "https://example.org/k8s-130");
        assert_eq!(parsed[0].title, "Kubernetes 1.30 est disponible");
        assert_eq!(parsed[0].source_ref, "https://example.org/rss.xml");
    }

    #[test]
    fn test_rejects_unparseable_date() {
        let entry = RssEntry {
            title: Some("t".to_string()),
            link: Some("https://example.org/x".to_string()),
            pub_date: Some("not a date".to_string()),
            description: None,
        };
        assert!(parse_entry(entry, "u").is_err());
    }
}

//! CVE security-feed watcher
//!
//! Polls the latest-CVEs API, filters against a fixed keyword watchlist,
//! and alerts once per newly observed identifier. Dedup state is volatile:
//! a restart starts from an empty set.

use super::dedup::SeenSet;
use super::{CycleOutcome, Watcher};
use crate::fetch::CveFetcher;
use crate::notify::{Notification, NotificationSink, NotifyError, Severity};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Ordered keyword-to-category table.
///
/// Matching is a case-insensitive substring check; the first matching
/// keyword wins, with insertion order as the tie-break.
pub struct Watchlist {
    rules: Vec<(String, String)>,
}

impl Watchlist {
    pub fn new(rules: Vec<(&str, &str)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(k, c)| (k.to_lowercase(), c.to_string()))
                .collect(),
        }
    }

    /// Classify free text against the watchlist.
    pub fn classify(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| text.contains(keyword))
            .map(|(_, category)| category.as_str())
    }
}

impl Default for Watchlist {
    fn default() -> Self {
        Self::new(vec![
            ("proxmox", "Infrastructure"),
            ("vmware", "Infrastructure"),
            ("n8n", "Infrastructure"),
            ("docker", "Conteneur"),
            ("kubernetes", "Conteneur"),
            ("k3s", "Conteneur"),
            ("nginx", "Web Server"),
            ("glpi", "Service Management"),
            ("grafana", "Monitoring"),
            ("ansible", "Automatisation"),
            ("windows", "Système Windows"),
            ("linux", "Système Linux"),
            ("fortinet", "Réseau"),
            ("cisco", "Réseau"),
            ("crowdsec", "Sécurité"),
            ("privilege escalation", "Sécurité Critique"),
            ("authentication bypass", "Sécurité Critique"),
        ])
    }
}

/// Pull the base score from the first metric entry carrying a known
/// scheme, preferring cvssV3_1 over cvssV3_0. Defaults to 0.0.
pub fn cvss_score(metrics: &[serde_json::Value]) -> f64 {
    for metric in metrics {
        for scheme in ["cvssV3_1", "cvssV3_0"] {
            if let Some(block) = metric.get(scheme) {
                return block.get("baseScore").and_then(|s| s.as_f64()).unwrap_or(0.0);
            }
        }
    }
    0.0
}

/// One tolerantly parsed CVE entry.
#[derive(Debug, Clone)]
struct CveRecord {
    id: String,
    title: String,
    summary: String,
    score: f64,
}

/// Parse one raw batch entry. Only the identifier is mandatory.
fn parse_record(raw: &serde_json::Value) -> Result<CveRecord> {
    let id = raw
        .pointer("/cveMetadata/cveId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MalformedData("CVE entry without cveId".to_string()))?
        .to_string();

    let cna = raw.pointer("/containers/cna");
    let title = cna
        .and_then(|c| c.get("title"))
        .and_then(|v| v.as_str())
        .unwrap_or("Titre non disponible")
        .to_string();
    let summary = cna
        .and_then(|c| c.get("descriptions"))
        .and_then(|d| d.get(0))
        .and_then(|d| d.get("value"))
        .and_then(|v| v.as_str())
        .unwrap_or("N/A")
        .to_string();
    let score = cna
        .and_then(|c| c.get("metrics"))
        .and_then(|m| m.as_array())
        .map(|m| cvss_score(m))
        .unwrap_or(0.0);

    Ok(CveRecord {
        id,
        title,
        summary,
        score,
    })
}

/// Watcher announcing newly observed, watchlist-relevant CVEs.
pub struct CveWatcher {
    fetcher: Arc<dyn CveFetcher>,
    sink: Arc<dyn NotificationSink>,
    seen: SeenSet,
    watchlist: Watchlist,
    channel: String,
}

impl CveWatcher {
    pub fn new(
        fetcher: Arc<dyn CveFetcher>,
        sink: Arc<dyn NotificationSink>,
        watchlist: Watchlist,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            sink,
            seen: SeenSet::new(),
            watchlist,
            channel: channel.into(),
        }
    }

    async fn run_cycle(&self) -> Result<CycleOutcome> {
        let batch = self.fetcher.fetch_latest().await?;

        let mut alerts = 0usize;
        // The API returns newest first; walking in reverse keeps the
        // alerts in chronological order when several arrive in one poll.
        for raw in batch.iter().rev() {
            let record = match parse_record(raw) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed CVE entry");
                    continue;
                }
            };

            if self.seen.seen(&record.id).await {
                continue;
            }

            let full_text = format!("{} {}", record.title, record.summary);
            let Some(category) = self.watchlist.classify(&full_text) else {
                // Not relevant: recorded so it is never reprocessed, but
                // never notified.
                self.seen.mark_seen(&record.id).await;
                continue;
            };

            let notification = Notification::new(
                format!("🚨 Nouvelle Alerte - {}", category),
                record.title.clone(),
            )
            .with_severity(Severity::from_score(record.score))
            .with_url(format!("https://www.cve.org/CVERecord?id={}", record.id))
            .with_field("Identifiant", record.id.clone())
            .with_field("Score", format!("{}/10", record.score));

            match self.sink.post(&self.channel, &notification).await {
                Ok(()) => {
                    self.seen.mark_seen(&record.id).await;
                    alerts += 1;
                    tracing::info!(cve = %record.id, category, "Alert sent");
                }
                Err(NotifyError::PermissionDenied(e)) => {
                    // Left unseen so the alert retries on the next cycle.
                    tracing::warn!(cve = %record.id, error = %e, "Delivery refused, will retry");
                }
                Err(NotifyError::Other(e)) => {
                    tracing::warn!(cve = %record.id, error = %e, "Delivery failed, will retry");
                }
            }
        }

        if alerts > 0 {
            Ok(CycleOutcome::Posted(format!("{} alerte(s) CVE", alerts)))
        } else {
            Ok(CycleOutcome::NothingNew)
        }
    }
}

#[async_trait]
impl Watcher for CveWatcher {
    fn name(&self) -> &'static str {
        "cve"
    }

    async fn cycle(&self, _force: bool) -> Result<CycleOutcome> {
        self.run_cycle().await
    }
}

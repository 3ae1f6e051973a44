//! RSS tech-news watcher
//!
//! Once a day (gated to a configured weekday on the scheduled path), picks
//! one unprocessed article from the monitored feeds, summarizes it through
//! the completion client, posts it, and only then commits the article link
//! to the durable dedup file.

use super::dedup::ProcessedStore;
use super::{CycleOutcome, Watcher};
use crate::chat::{Role, Turn};
use crate::config::RssConfig;
use crate::fetch::{FeedFetcher, WatchItem};
use crate::llm::{CompletionClient, CompletionError};
use crate::notify::{ChannelLogger, Notification, NotificationSink, NotifyError};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use rand::seq::SliceRandom;
use std::sync::Arc;

const SUMMARY_SYSTEM_PROMPT: &str = "Tu incarnes Paul-Louis Courier, un érudit français, qui \
    rédige un compte-rendu clair et concis (maximum 160 mots) de l'actualité IT pour des \
    étudiants. Adopte un ton érudit et incisif.";

const SUMMARY_MAX_TOKENS: u32 = 250;
const SUMMARY_TEMPERATURE: f32 = 0.7;

/// Watcher posting one summarized article per successful cycle.
pub struct RssWatcher {
    fetcher: Arc<dyn FeedFetcher>,
    sink: Arc<dyn NotificationSink>,
    completion: Arc<dyn CompletionClient>,
    store: ProcessedStore,
    log: ChannelLogger,
    channel: String,
    config: RssConfig,
}

impl RssWatcher {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        sink: Arc<dyn NotificationSink>,
        completion: Arc<dyn CompletionClient>,
        channel: impl Into<String>,
        config: RssConfig,
    ) -> Self {
        let log = ChannelLogger::new(sink.clone(), config.log_channel.clone(), "RSS");
        Self {
            fetcher,
            sink,
            completion,
            store: ProcessedStore::new(config.processed_file.clone()),
            log,
            channel: channel.into(),
            config,
        }
    }

    /// One watch cycle at `now`. The weekday gate only applies to the
    /// scheduled path; `force` bypasses it.
    pub async fn run(&self, force: bool, now: DateTime<Utc>) -> Result<CycleOutcome> {
        if !force && now.weekday() != self.config.gate_weekday {
            self.log
                .info("Jour non planifié, la veille hebdomadaire est ignorée.")
                .await;
            return Ok(CycleOutcome::Skipped);
        }

        self.log
            .info("Veille démarrée : vérification des flux...")
            .await;

        let mut processed = self.store.load().await;
        let items = self.fetcher.fetch().await?;

        let cutoff = now - chrono::Duration::hours(self.config.window_hours);
        let candidates: Vec<WatchItem> = items
            .into_iter()
            .filter(|item| !processed.contains(&item.identifier) && item.published_at >= cutoff)
            .collect();

        let Some(article) = candidates.choose(&mut rand::thread_rng()).cloned() else {
            self.log
                .info("Aucun nouvel article trouvé dans la fenêtre de veille.")
                .await;
            return Ok(CycleOutcome::NothingNew);
        };

        self.log
            .info(&format!("Article sélectionné : {}", article.title))
            .await;

        let summary = self.summarize(&article).await;

        let notification = Notification::new("Synthèse de l'article", summary)
            .with_url(article.identifier.clone())
            .with_field("Article", article.title.clone());

        match self.sink.post(&self.channel, &notification).await {
            Ok(()) => {
                // Commit only after confirmed delivery, so a failed post is
                // retried on a later cycle.
                self.store.commit(&article.identifier, &mut processed).await;
                self.log
                    .success(&format!("Veille terminée. Article posté : {}", article.title))
                    .await;
                Ok(CycleOutcome::Posted(article.title))
            }
            Err(NotifyError::PermissionDenied(e)) => {
                self.log
                    .error("Permission refusée : impossible de poster dans ce salon.")
                    .await;
                Err(Error::Permission(e))
            }
            Err(NotifyError::Other(e)) => {
                self.log
                    .error(&format!("Erreur lors de la publication : {}", e))
                    .await;
                Err(Error::Notify(e))
            }
        }
    }

    /// Generate the article summary. Completion failures degrade to a
    /// fixed placeholder text so the cycle still posts.
    async fn summarize(&self, article: &WatchItem) -> String {
        let messages = vec![
            Turn::new(Role::System, SUMMARY_SYSTEM_PROMPT),
            Turn::new(
                Role::User,
                format!(
                    "Rédige un compte-rendu à partir du titre et du résumé suivant : \
                     Titre de l'article : {}\nContenu à résumer : {}",
                    article.title, article.body_text
                ),
            ),
        ];

        match self
            .completion
            .complete(&messages, SUMMARY_MAX_TOKENS, SUMMARY_TEMPERATURE)
            .await
        {
            Ok(summary) => summary,
            Err(CompletionError::Timeout) => {
                self.log
                    .error("Timeout : l'API de complétion a mis trop de temps à répondre.")
                    .await;
                "⏱️ **Timeout de l'API.** Le résumé n'a pu être généré.".to_string()
            }
            Err(CompletionError::Upstream { status, message }) => {
                self.log
                    .error(&format!("Erreur HTTP {} de l'API : {}", status, message))
                    .await;
                "⚠️ **Erreur API.** Le résumé n'a pu être généré.".to_string()
            }
            Err(CompletionError::Transport(e)) => {
                self.log
                    .error(&format!("Erreur inattendue lors de la génération : {}", e))
                    .await;
                "❌ **Erreur inattendue.** Le résumé n'a pu être généré.".to_string()
            }
        }
    }
}

#[async_trait]
impl Watcher for RssWatcher {
    fn name(&self) -> &'static str {
        "rss"
    }

    async fn cycle(&self, force: bool) -> Result<CycleOutcome> {
        self.run(force, Utc::now()).await
    }
}

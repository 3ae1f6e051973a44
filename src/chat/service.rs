//! Interactive ask/clear handling
//!
//! Glues the rate limiter, the session store and the completion client
//! together for the request-handling path. Outcomes are returned as data;
//! the chat front end renders them into platform replies.

use super::rate_limit::RateLimiter;
use super::session::{Role, SessionStore, Turn};
use crate::config::ChatConfig;
use crate::llm::{CompletionClient, CompletionError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "Tu incarnes Paul-Louis Courier, un érudit et écrivain français. \
    Tes réponses sont claires, concises, précises et rédigées dans un français soutenu mais \
    accessible. Tu es professionnel, courtois et vas droit au but. Tu peux faire référence \
    aux messages précédents de la conversation.";

const REPLY_MAX_CHARS: usize = 1900;

/// Result of an interactive question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    /// The model answered; `exchanges` counts stored question/answer pairs
    Answer { text: String, exchanges: usize },
    /// Denied by the rate limiter
    RateLimited { retry_after_secs: i64 },
    /// The question exceeds the configured length limit
    TooLong { max: usize },
    /// A labeled, user-visible failure
    Failed { message: String },
}

/// Interactive chat service.
pub struct ChatService {
    limiter: RateLimiter,
    sessions: SessionStore,
    completion: Arc<dyn CompletionClient>,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(completion: Arc<dyn CompletionClient>, config: ChatConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.max_requests, config.window_secs),
            sessions: SessionStore::new(config.session_cap, config.session_timeout_secs),
            completion,
            config,
        }
    }

    /// Answer one question for `user_id`, maintaining that user's bounded
    /// conversation history.
    pub async fn ask(&self, user_id: &str, question: &str, now: DateTime<Utc>) -> AskOutcome {
        let decision = self.limiter.admit(user_id, now).await;
        if !decision.allowed {
            return AskOutcome::RateLimited {
                retry_after_secs: decision.retry_after_secs,
            };
        }

        if question.chars().count() > self.config.max_question_len {
            return AskOutcome::TooLong {
                max: self.config.max_question_len,
            };
        }

        // The system prompt is supplied fresh on every call; only user and
        // assistant turns are stored.
        let history = self.sessions.history(user_id, now).await;
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Turn::new(Role::System, SYSTEM_PROMPT));
        messages.extend(history);
        messages.push(Turn::new(Role::User, question));

        tracing::info!(user = user_id, history_len = messages.len() - 2, "Chat question received");

        let reply = match self
            .completion
            .complete(&messages, self.config.max_tokens, self.config.temperature)
            .await
        {
            Ok(reply) => reply,
            Err(CompletionError::Timeout) => {
                tracing::warn!(user = user_id, "Completion timed out");
                return AskOutcome::Failed {
                    message: "⏱️ L'API a mis trop de temps à répondre. Veuillez réessayer."
                        .to_string(),
                };
            }
            Err(CompletionError::Upstream { status, message }) => {
                tracing::error!(user = user_id, status, %message, "Upstream completion error");
                return AskOutcome::Failed {
                    message: format!(
                        "⚠️ Une erreur est survenue avec l'API du modèle.\n```{}```",
                        message
                    ),
                };
            }
            Err(CompletionError::Transport(e)) => {
                tracing::error!(user = user_id, error = %e, "Unexpected completion failure");
                return AskOutcome::Failed {
                    message: "❌ Une erreur inattendue est survenue.".to_string(),
                };
            }
        };

        self.sessions.append(user_id, Role::User, question, now).await;
        self.sessions.append(user_id, Role::Assistant, &reply, now).await;

        let exchanges = self.sessions.history(user_id, now).await.len() / 2;
        AskOutcome::Answer {
            text: truncate_reply(&reply, REPLY_MAX_CHARS),
            exchanges,
        }
    }

    /// Erase the user's stored conversation.
    pub async fn clear(&self, user_id: &str) {
        self.sessions.clear(user_id).await;
        tracing::info!(user = user_id, "Conversation cleared");
    }
}

/// Truncate a reply to the last complete sentence within `max_chars`.
fn truncate_reply(reply: &str, max_chars: usize) -> String {
    if reply.chars().count() <= max_chars {
        return reply.to_string();
    }

    let truncated: String = reply.chars().take(max_chars).collect();
    let last_sentence_end = truncated
        .rmatch_indices(['.', '!', '?'])
        .map(|(i, m)| i + m.len())
        .next();

    match last_sentence_end {
        // Only cut at a sentence when it keeps most of the text.
        Some(end) if end > max_chars * 7 / 10 => {
            format!("{}\n\n*[Réponse tronquée]*", &truncated[..end])
        }
        _ => format!("{}...\n\n*[Réponse tronquée]*", truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoCompletion;

    #[async_trait]
    impl CompletionClient for EchoCompletion {
        async fn complete(
            &self,
            messages: &[Turn],
            _max_tokens: u32,
            _temperature: f32,
        ) -> std::result::Result<String, CompletionError> {
            let question = &messages.last().unwrap().content;
            Ok(format!("Réponse à « {} »", question))
        }
    }

    struct TimeoutCompletion;

    #[async_trait]
    impl CompletionClient for TimeoutCompletion {
        async fn complete(
            &self,
            _messages: &[Turn],
            _max_tokens: u32,
            _temperature: f32,
        ) -> std::result::Result<String, CompletionError> {
            Err(CompletionError::Timeout)
        }
    }

    fn service(completion: Arc<dyn CompletionClient>) -> ChatService {
        ChatService::new(completion, ChatConfig::default())
    }

    #[tokio::test]
    async fn test_ask_answers_and_counts_exchanges() {
        let service = service(Arc::new(EchoCompletion));
        let now = Utc::now();

        let outcome = service.ask("user-1", "Bonjour ?", now).await;
        match outcome {
            AskOutcome::Answer { text, exchanges } => {
                assert!(text.contains("Bonjour"));
                assert_eq!(exchanges, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let outcome = service.ask("user-1", "Encore ?", now).await;
        assert!(matches!(outcome, AskOutcome::Answer { exchanges: 2, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_denies_burst() {
        let service = service(Arc::new(EchoCompletion));
        let now = Utc::now();

        for _ in 0..5 {
            let outcome = service.ask("user-1", "q", now).await;
            assert!(matches!(outcome, AskOutcome::Answer { .. }));
        }

        let outcome = service.ask("user-1", "q", now).await;
        assert!(matches!(
            outcome,
            AskOutcome::RateLimited { retry_after_secs } if retry_after_secs > 0
        ));
    }

    #[tokio::test]
    async fn test_too_long_question_rejected_before_completion() {
        let service = service(Arc::new(TimeoutCompletion));
        let question = "x".repeat(501);

        let outcome = service.ask("user-1", &question, Utc::now()).await;
        assert_eq!(outcome, AskOutcome::TooLong { max: 500 });
    }

    #[tokio::test]
    async fn test_timeout_maps_to_labeled_failure_and_stores_nothing() {
        let service = service(Arc::new(TimeoutCompletion));
        let now = Utc::now();

        let outcome = service.ask("user-1", "q", now).await;
        assert!(matches!(
            outcome,
            AskOutcome::Failed { message } if message.contains("trop de temps")
        ));

        // The failed exchange was not appended to the session.
        assert!(service.sessions.history("user-1", now).await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_resets_exchange_count() {
        let service = service(Arc::new(EchoCompletion));
        let now = Utc::now();

        service.ask("user-1", "un", now).await;
        service.clear("user-1").await;

        let outcome = service.ask("user-1", "deux", now).await;
        assert!(matches!(outcome, AskOutcome::Answer { exchanges: 1, .. }));
    }

    #[test]
    fn test_truncate_reply_prefers_sentence_boundary() {
        let long = format!("{}{}", "Une phrase complète. ".repeat(200), "reste");
        let truncated = truncate_reply(&long, 1900);
        assert!(truncated.chars().count() < long.chars().count());
        assert!(truncated.contains("[Réponse tronquée]"));
        assert!(truncated.contains('.'));

        let short = "Courte réponse.";
        assert_eq!(truncate_reply(short, 1900), short);
    }
}

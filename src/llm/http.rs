//! OpenAI-style chat-completions client over HTTP

use super::{CompletionClient, CompletionError};
use crate::chat::Turn;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Completion client for OpenAI-compatible chat endpoints.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    base_url: String,
    model_id: String,
    api_token: Option<String>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl HttpCompletionClient {
    /// Create a client for `model_id` against `base_url`, with an explicit
    /// per-call timeout.
    pub fn new(
        base_url: impl Into<String>,
        model_id: impl Into<String>,
        api_token: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model_id: model_id.into(),
            api_token,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn post_completion(
        &self,
        messages: &[Turn],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let body = serde_json::json!({
            "model": self.model_id,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "stream": false,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CompletionError::Transport("empty choices in response".to_string()))?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        messages: &[Turn],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        match tokio::time::timeout(
            self.timeout,
            self.post_completion(messages, max_tokens, temperature),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout),
        }
    }
}

//! Hosted language-model completion interface
//!
//! The model is a black box behind [`CompletionClient`]: ordered messages
//! in, text out. Timeouts and upstream HTTP errors are surfaced as
//! distinct conditions so the interactive path can label its replies.

mod http;

pub use http::HttpCompletionClient;

use crate::chat::Turn;
use async_trait::async_trait;
use thiserror::Error;

/// Completion call failure modes.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// The call exceeded its explicit timeout
    #[error("completion timed out")]
    Timeout,

    /// The upstream API answered with an error status
    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Transport-level failure reaching the API
    #[error("transport error: {0}")]
    Transport(String),
}

/// Black-box completion call against a hosted model.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one chat completion over `messages` and return the reply text.
    async fn complete(
        &self,
        messages: &[Turn],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, CompletionError>;
}

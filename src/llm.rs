//! LLM provider abstraction
//!
//! A provider hands out chat sessions; a chat session remembers its prior
//! turns and streams the reply to each new message.

mod error;
mod gemini;
mod types;

#[cfg(test)]
mod proptests;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiService;
pub use types::*;

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for LLM providers
pub trait LlmService: Send + Sync {
    /// Start a chat session with a fixed system instruction
    fn start_chat(&self, system_instruction: &str) -> Result<Arc<dyn ChatSession>, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// A conversation with the model that carries prior turns as context
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Send a user message and stream the reply.
    ///
    /// The exchange is added to the session history only if the stream
    /// runs to completion.
    async fn send_message_stream(&self, text: &str) -> Result<FragmentStream, LlmError>;

    /// Number of messages remembered so far
    fn history_len(&self) -> usize;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

impl LlmService for LoggingService {
    fn start_chat(&self, system_instruction: &str) -> Result<Arc<dyn ChatSession>, LlmError> {
        match self.inner.start_chat(system_instruction) {
            Ok(session) => {
                tracing::info!(
                    model = %self.model_id,
                    instruction_chars = system_instruction.len(),
                    "Chat session created"
                );
                Ok(Arc::new(LoggingSession {
                    inner: session,
                    model_id: self.model_id.clone(),
                }))
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    error = %e,
                    kind = e.kind.as_str(),
                    "Chat session creation failed"
                );
                Err(e)
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

struct LoggingSession {
    inner: Arc<dyn ChatSession>,
    model_id: String,
}

#[async_trait]
impl ChatSession for LoggingSession {
    async fn send_message_stream(&self, text: &str) -> Result<FragmentStream, LlmError> {
        let start = Instant::now();
        let history = self.inner.history_len();
        let fragments = match self.inner.send_message_stream(text).await {
            Ok(fragments) => fragments,
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e,
                    kind = e.kind.as_str(),
                    "LLM stream failed to open"
                );
                return Err(e);
            }
        };

        tracing::debug!(
            model = %self.model_id,
            history,
            open_ms = %start.elapsed().as_millis(),
            "LLM stream opened"
        );

        let model_id = self.model_id.clone();
        let logged = async_stream::stream! {
            let mut fragments = fragments;
            let mut count = 0usize;
            let mut chars = 0usize;
            while let Some(item) = fragments.next().await {
                match &item {
                    Ok(fragment) => {
                        count += 1;
                        chars += fragment.len();
                    }
                    Err(e) => {
                        tracing::error!(
                            model = %model_id,
                            duration_ms = %start.elapsed().as_millis(),
                            fragments = count,
                            error = %e,
                            kind = e.kind.as_str(),
                            "LLM stream failed"
                        );
                    }
                }
                let failed = item.is_err();
                yield item;
                if failed {
                    return;
                }
            }
            tracing::info!(
                model = %model_id,
                duration_ms = %start.elapsed().as_millis(),
                fragments = count,
                chars,
                "LLM stream completed"
            );
        };

        Ok(Box::pin(logged))
    }

    fn history_len(&self) -> usize {
        self.inner.history_len()
    }
}

//! Mock implementations for testing
//!
//! These mocks let the runtime be driven end to end without a network.

use super::traits::*;
use crate::llm::{ChatSession, FragmentStream, LlmError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// How the next reply stream behaves
pub enum ScriptedReply {
    /// Yield the fragments, then finish normally
    Fragments(Vec<String>),
    /// Yield the fragments, then fail
    FailAfter(Vec<String>, LlmError),
    /// Fail before any fragment arrives
    FailToOpen(LlmError),
    /// Yield `before`, wait for the gate, then yield `after` and finish
    Gated {
        before: Vec<String>,
        after: Vec<String>,
        gate: Arc<Notify>,
    },
    /// The stream panics when polled
    Panic,
}

impl ScriptedReply {
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fragments(fragments.into_iter().map(Into::into).collect())
    }
}

#[derive(Default)]
struct MockShared {
    replies: Mutex<VecDeque<ScriptedReply>>,
    session_failures: Mutex<VecDeque<LlmError>>,
    created: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
}

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that plays back queued replies
#[derive(Default)]
pub struct MockLlmClient {
    shared: Arc<MockShared>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the behavior of the next reply stream
    pub fn queue_reply(&self, reply: ScriptedReply) {
        self.shared.replies.lock().unwrap().push_back(reply);
    }

    /// Make the next session creation fail
    pub fn fail_session_creation(&self, error: LlmError) {
        self.shared.session_failures.lock().unwrap().push_back(error);
    }

    /// System instructions of every session created so far
    pub fn created_sessions(&self) -> Vec<String> {
        self.shared.created.lock().unwrap().clone()
    }

    /// Every message text sent, across sessions
    pub fn sent_texts(&self) -> Vec<String> {
        self.shared.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn create_session(&self, system_instruction: &str) -> Result<SessionHandle, LlmError> {
        if let Some(error) = self.shared.session_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.shared
            .created
            .lock()
            .unwrap()
            .push(system_instruction.to_string());
        Ok(Arc::new(MockChatSession {
            shared: self.shared.clone(),
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }

    async fn send_and_stream(
        &self,
        session: &SessionHandle,
        text: &str,
    ) -> Result<FragmentStream, LlmError> {
        self.shared.sent.lock().unwrap().push(text.to_string());
        session.send_message_stream(text).await
    }
}

// ============================================================================
// Mock Chat Session
// ============================================================================

/// Session whose history grows only when a reply stream completes
pub struct MockChatSession {
    shared: Arc<MockShared>,
    history: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChatSession for MockChatSession {
    async fn send_message_stream(&self, text: &str) -> Result<FragmentStream, LlmError> {
        let reply = self
            .shared
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::network("No mock reply queued"))?;

        let history = self.history.clone();
        let prompt = text.to_string();

        let stream: FragmentStream = match reply {
            ScriptedReply::FailToOpen(error) => return Err(error),
            ScriptedReply::Fragments(fragments) => Box::pin(async_stream::stream! {
                let mut reply = String::new();
                for fragment in fragments {
                    reply.push_str(&fragment);
                    yield Ok::<_, LlmError>(fragment);
                }
                history.lock().unwrap().extend([prompt, reply]);
            }),
            ScriptedReply::FailAfter(fragments, error) => Box::pin(async_stream::stream! {
                for fragment in fragments {
                    yield Ok::<_, LlmError>(fragment);
                }
                yield Err(error);
            }),
            ScriptedReply::Gated {
                before,
                after,
                gate,
            } => Box::pin(async_stream::stream! {
                let mut reply = String::new();
                for fragment in before {
                    reply.push_str(&fragment);
                    yield Ok::<_, LlmError>(fragment);
                }
                gate.notified().await;
                for fragment in after {
                    reply.push_str(&fragment);
                    yield Ok::<_, LlmError>(fragment);
                }
                history.lock().unwrap().extend([prompt, reply]);
            }),
            ScriptedReply::Panic => Box::pin(async_stream::stream! {
                yield Ok::<_, LlmError>("Half a thought".to_string());
                panic!("mock stream panicked");
            }),
        };

        Ok(stream)
    }

    fn history_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }
}

//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::llm::{ChatSession, FragmentStream, LlmError, LlmService};
use async_trait::async_trait;
use std::sync::Arc;

/// Handle to a live model session
pub type SessionHandle = Arc<dyn ChatSession>;

/// Client for the streaming model backend
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Create a session carrying the given system instruction
    async fn create_session(&self, system_instruction: &str) -> Result<SessionHandle, LlmError>;

    /// Send `text` within `session` and stream the reply
    async fn send_and_stream(
        &self,
        session: &SessionHandle,
        text: &str,
    ) -> Result<FragmentStream, LlmError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn create_session(&self, system_instruction: &str) -> Result<SessionHandle, LlmError> {
        (**self).create_session(system_instruction).await
    }

    async fn send_and_stream(
        &self,
        session: &SessionHandle,
        text: &str,
    ) -> Result<FragmentStream, LlmError> {
        (**self).send_and_stream(session, text).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use an `LlmService` as `LlmClient`
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn create_session(&self, system_instruction: &str) -> Result<SessionHandle, LlmError> {
        self.service.start_chat(system_instruction)
    }

    async fn send_and_stream(
        &self,
        session: &SessionHandle,
        text: &str,
    ) -> Result<FragmentStream, LlmError> {
        session.send_message_stream(text).await
    }
}

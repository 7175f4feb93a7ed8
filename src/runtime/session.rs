//! Lifecycle of the single model session
//!
//! Created on first use, dropped on reset. There is never more than one.

use super::traits::{LlmClient, SessionHandle};
use crate::llm::LlmError;
use std::sync::Arc;

pub struct SessionLifecycle<L: LlmClient> {
    client: Arc<L>,
    system_instruction: String,
    current: Option<SessionHandle>,
    /// Sessions created so far
    generation: u64,
}

impl<L: LlmClient> SessionLifecycle<L> {
    pub fn new(client: Arc<L>, system_instruction: impl Into<String>) -> Self {
        Self {
            client,
            system_instruction: system_instruction.into(),
            current: None,
            generation: 0,
        }
    }

    /// Current session, created with the system instruction if absent
    pub async fn ensure_session(&mut self) -> Result<SessionHandle, LlmError> {
        if let Some(session) = &self.current {
            return Ok(session.clone());
        }

        let session = self
            .client
            .create_session(&self.system_instruction)
            .await?;
        self.generation += 1;
        tracing::info!(generation = self.generation, "Model session created");
        self.current = Some(session.clone());
        Ok(session)
    }

    /// Forget the current session; the next send starts with no memory
    pub fn reset_session(&mut self) {
        self.current = None;
        tracing::info!(generation = self.generation, "Model session discarded");
    }

    pub fn is_live(&self) -> bool {
        self.current.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

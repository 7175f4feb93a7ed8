//! Conversation state types

use crate::transcript::TurnId;
use serde::{Deserialize, Serialize};

/// Where the conversation is in its request cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Intro screen shown, conversation not begun yet
    #[default]
    Intro,

    /// Ready for user input, no request in flight
    Idle,

    /// User turn and placeholder appended, stream not producing yet
    AwaitingStream { reply_id: TurnId },

    /// Fragments arriving for the placeholder
    Streaming {
        reply_id: TurnId,
        /// Everything received so far
        text: String,
    },
}

impl ConvState {
    /// Check if a request cycle is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ConvState::AwaitingStream { .. } | ConvState::Streaming { .. }
        )
    }

    /// Placeholder turn of the in-flight cycle
    pub fn reply_id(&self) -> Option<&TurnId> {
        match self {
            ConvState::AwaitingStream { reply_id } | ConvState::Streaming { reply_id, .. } => {
                Some(reply_id)
            }
            ConvState::Intro | ConvState::Idle => None,
        }
    }

    /// Short name for logs and client notifications
    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Intro => "intro",
            ConvState::Idle => "idle",
            ConvState::AwaitingStream { .. } => "awaiting_stream",
            ConvState::Streaming { .. } => "streaming",
        }
    }
}

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone)]
pub struct ConvContext {
    /// Seed turn after begin and reset
    pub greeting: String,
    /// Fixed reply appended when a cycle fails
    pub apology: String,
}

impl ConvContext {
    pub fn new(greeting: impl Into<String>, apology: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
            apology: apology.into(),
        }
    }
}

impl Default for ConvContext {
    fn default() -> Self {
        Self::new(
            crate::system_prompt::INITIAL_GREETING,
            crate::system_prompt::APOLOGY_MESSAGE,
        )
    }
}

//! Events that can occur in a conversation

use crate::transcript::{TurnId, TurnStamp};

/// Events that trigger state transitions
///
/// Events that create turns carry the stamps for them, so that the
/// transition function stays deterministic.
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    /// Intro dismissed
    Begin { greeting: TurnStamp },
    UserMessage {
        text: String,
        user_turn: TurnStamp,
        reply_turn: TurnStamp,
    },
    Reset { greeting: TurnStamp },

    // Stream events, tagged with the placeholder of their cycle
    StreamOpened { reply_id: TurnId },
    Fragment { reply_id: TurnId, text: String },
    StreamEnded { reply_id: TurnId },
    StreamFailed {
        reply_id: TurnId,
        message: String,
        apology: TurnStamp,
    },
}

impl Event {
    pub fn begin() -> Self {
        Event::Begin {
            greeting: TurnStamp::now(),
        }
    }

    pub fn user_message(text: impl Into<String>) -> Self {
        Event::UserMessage {
            text: text.into(),
            user_turn: TurnStamp::now(),
            reply_turn: TurnStamp::now(),
        }
    }

    pub fn reset() -> Self {
        Event::Reset {
            greeting: TurnStamp::now(),
        }
    }

    pub fn stream_failed(reply_id: TurnId, message: impl Into<String>) -> Self {
        Event::StreamFailed {
            reply_id,
            message: message.into(),
            apology: TurnStamp::now(),
        }
    }

    /// Cycle this event belongs to, for stream events
    pub fn reply_id(&self) -> Option<&TurnId> {
        match self {
            Event::StreamOpened { reply_id }
            | Event::Fragment { reply_id, .. }
            | Event::StreamEnded { reply_id }
            | Event::StreamFailed { reply_id, .. } => Some(reply_id),
            Event::Begin { .. } | Event::UserMessage { .. } | Event::Reset { .. } => None,
        }
    }
}

//! Effects produced by state transitions

use crate::transcript::{Turn, TurnId};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Add a turn to the end of the transcript
    AppendTurn(Turn),

    /// Replace the text of a turn
    UpdateText { id: TurnId, text: String },

    /// Mark a pending turn as complete
    FinalizeTurn { id: TurnId },

    /// Mark a pending turn whose stream broke off
    FailTurn { id: TurnId },

    /// Replace the transcript with a single seed turn
    ResetTranscript { seed: Turn },

    /// Drop the model session so the next request starts fresh
    ResetSession,

    /// Ensure a session and start streaming the reply to `text`
    OpenStream { reply_id: TurnId, text: String },

    /// Tell connected clients the busy flag changed
    NotifyState { busy: bool },
}

impl Effect {
    pub fn append(turn: Turn) -> Self {
        Effect::AppendTurn(turn)
    }

    pub fn update_text(id: &TurnId, text: impl Into<String>) -> Self {
        Effect::UpdateText {
            id: id.clone(),
            text: text.into(),
        }
    }

    pub fn notify_busy() -> Self {
        Effect::NotifyState { busy: true }
    }

    pub fn notify_idle() -> Self {
        Effect::NotifyState { busy: false }
    }
}

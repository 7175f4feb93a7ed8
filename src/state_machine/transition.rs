//! Pure state transition function
//!
//! One request cycle: the user turn and an empty placeholder are appended,
//! fragments are accumulated into the placeholder, and the cycle ends with
//! the placeholder finalized or, on failure, marked failed next to a fixed
//! apology turn. Only one cycle may be in flight.

use super::{ConvContext, ConvState, Effect, Event};
use crate::transcript::{Turn, TurnId};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("A reply is still streaming, wait for it to finish")]
    AgentBusy,
    #[error("Conversation has not begun")]
    NotStarted,
    #[error("Stream event for {0} does not belong to the current cycle")]
    StaleStreamEvent(TurnId),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Intro
        // ============================================================
        (ConvState::Intro, Event::Begin { greeting }) => {
            let seed = Turn::assistant(greeting, &context.greeting);
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::ResetTranscript { seed })
                .with_effect(Effect::notify_idle()))
        }

        // Begin after the intro is gone changes nothing
        (_, Event::Begin { .. }) => Ok(TransitionResult::new(state.clone())),

        (ConvState::Intro, Event::UserMessage { .. } | Event::Reset { .. }) => {
            Err(TransitionError::NotStarted)
        }

        // ============================================================
        // User message
        // ============================================================
        (
            ConvState::Idle,
            Event::UserMessage {
                text,
                user_turn,
                reply_turn,
            },
        ) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(TransitionError::EmptyInput);
            }

            let reply_id = reply_turn.id.clone();
            Ok(TransitionResult::new(ConvState::AwaitingStream {
                reply_id: reply_id.clone(),
            })
            .with_effect(Effect::append(Turn::user(user_turn, text)))
            .with_effect(Effect::append(Turn::placeholder(reply_turn)))
            .with_effect(Effect::notify_busy())
            .with_effect(Effect::OpenStream {
                reply_id,
                text: text.to_string(),
            }))
        }

        // Single-flight: one cycle at a time
        (
            ConvState::AwaitingStream { .. } | ConvState::Streaming { .. },
            Event::UserMessage { .. } | Event::Reset { .. },
        ) => Err(TransitionError::AgentBusy),

        // ============================================================
        // Reset
        // ============================================================
        (ConvState::Idle, Event::Reset { greeting }) => {
            let seed = Turn::assistant(greeting, &context.greeting);
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::ResetSession)
                .with_effect(Effect::ResetTranscript { seed }))
        }

        // ============================================================
        // Stream events
        // ============================================================
        (ConvState::AwaitingStream { reply_id }, Event::StreamOpened { reply_id: id })
            if *reply_id == id =>
        {
            Ok(TransitionResult::new(ConvState::Streaming {
                reply_id: id,
                text: String::new(),
            }))
        }

        (
            ConvState::AwaitingStream { reply_id },
            Event::Fragment {
                reply_id: id,
                text: fragment,
            },
        ) if *reply_id == id => Ok(apply_fragment(id, String::new(), &fragment)),

        (
            ConvState::Streaming { reply_id, text },
            Event::Fragment {
                reply_id: id,
                text: fragment,
            },
        ) if *reply_id == id => Ok(apply_fragment(id, text.clone(), &fragment)),

        (
            ConvState::AwaitingStream { reply_id } | ConvState::Streaming { reply_id, .. },
            Event::StreamEnded { reply_id: id },
        ) if *reply_id == id => Ok(TransitionResult::new(ConvState::Idle)
            .with_effect(Effect::FinalizeTurn { id })
            .with_effect(Effect::notify_idle())),

        // The placeholder keeps whatever text arrived
        (
            ConvState::AwaitingStream { reply_id } | ConvState::Streaming { reply_id, .. },
            Event::StreamFailed {
                reply_id: id,
                apology,
                ..
            },
        ) if *reply_id == id => Ok(TransitionResult::new(ConvState::Idle)
            .with_effect(Effect::FailTurn { id })
            .with_effect(Effect::append(Turn::assistant(apology, &context.apology)))
            .with_effect(Effect::notify_idle())),

        (
            _,
            Event::StreamOpened { reply_id }
            | Event::Fragment { reply_id, .. }
            | Event::StreamEnded { reply_id }
            | Event::StreamFailed { reply_id, .. },
        ) => Err(TransitionError::StaleStreamEvent(reply_id)),
    }
}

/// Accumulate a fragment and write the whole accumulated text back
fn apply_fragment(reply_id: TurnId, mut text: String, fragment: &str) -> TransitionResult {
    if fragment.is_empty() {
        return TransitionResult::new(ConvState::Streaming { reply_id, text });
    }

    text.push_str(fragment);
    let effect = Effect::update_text(&reply_id, text.clone());
    TransitionResult::new(ConvState::Streaming { reply_id, text }).with_effect(effect)
}

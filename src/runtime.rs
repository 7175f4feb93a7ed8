//! Runtime for executing the conversation
//!
//! One task owns the state, the transcript and the model session, and
//! drains a single queue of inputs. Stream consumption runs in a separate
//! task per cycle that feeds fragment events back onto the same queue, so
//! fragments are applied in the order they arrive.

mod executor;
mod session;
pub mod traits;

#[cfg(test)]
pub mod testing;


pub use executor::ConversationRuntime;
pub use traits::*;

use crate::state_machine::{ConvContext, Event, TransitionError};
use crate::transcript::Turn;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Inputs processed by the runtime task, in arrival order
pub(crate) enum RuntimeInput {
    /// User action; the reply reports whether it was accepted
    Command {
        event: Event,
        reply: oneshot::Sender<Result<(), TransitionError>>,
    },
    /// Produced by the stream task of the current cycle
    Stream(Event),
    /// Copy of the current conversation
    Snapshot(oneshot::Sender<ConversationView>),
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { conversation: Value },
    TurnAppended { turn: Value },
    TurnUpdated { turn: Value },
    TranscriptReset { turns: Vec<Value> },
    StateChange { state: String, busy: bool },
}

/// Whether the intro screen is still up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intro,
    Chat,
}

/// Read-only copy of the conversation for rendering
#[derive(Debug, Clone)]
pub struct ConversationView {
    pub phase: Phase,
    pub busy: bool,
    pub turns: Vec<Turn>,
}

impl ConversationView {
    pub fn to_json(&self) -> Value {
        json!({
            "phase": self.phase,
            "busy": self.busy,
            "turns": self.turns.iter().map(Turn::to_json).collect::<Vec<_>>(),
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Conversation runtime has stopped")]
    Closed,
}

/// Handle to interact with the running conversation
#[derive(Clone)]
pub struct RuntimeHandle {
    input_tx: mpsc::Sender<RuntimeInput>,
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl RuntimeHandle {
    /// Start the runtime task. It stops once every handle is dropped.
    pub fn spawn<L: LlmClient + 'static>(
        llm_client: L,
        system_instruction: impl Into<String>,
        context: ConvContext,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(64);
        let (broadcast_tx, _) = broadcast::channel(1024);

        let runtime = ConversationRuntime::new(
            context,
            llm_client,
            system_instruction.into(),
            input_rx,
            input_tx.downgrade(),
            broadcast_tx.clone(),
        );
        tokio::spawn(runtime.run());

        Self {
            input_tx,
            broadcast_tx,
        }
    }

    /// Dismiss the intro and seed the greeting
    pub async fn begin(&self) -> Result<(), RuntimeError> {
        self.command(Event::begin()).await
    }

    /// Start a request cycle for `text`
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        self.command(Event::user_message(text)).await
    }

    /// Start over with a fresh session and only the greeting
    pub async fn reset(&self) -> Result<(), RuntimeError> {
        self.command(Event::reset()).await
    }

    pub async fn snapshot(&self) -> Result<ConversationView, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.input_tx
            .send(RuntimeInput::Snapshot(reply))
            .await
            .map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Subscribe to conversation updates
    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    async fn command(&self, event: Event) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.input_tx
            .send(RuntimeInput::Command { event, reply })
            .await
            .map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)??;
        Ok(())
    }
}

//! Conversation runtime executor

use super::session::SessionLifecycle;
use super::traits::{LlmClient, SessionHandle};
use super::{ConversationView, Phase, RuntimeInput, SseEvent};

use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event, TransitionError};
use crate::transcript::{Transcript, Turn, TurnId};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Conversation runtime generic over the model backend
pub struct ConversationRuntime<L>
where
    L: LlmClient + 'static,
{
    context: ConvContext,
    state: ConvState,
    transcript: Transcript,
    sessions: SessionLifecycle<L>,
    llm_client: Arc<L>,
    input_rx: mpsc::Receiver<RuntimeInput>,
    /// Weak so that the queue closes once every handle is gone
    input_tx: mpsc::WeakSender<RuntimeInput>,
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl<L> ConversationRuntime<L>
where
    L: LlmClient + 'static,
{
    pub(crate) fn new(
        context: ConvContext,
        llm_client: L,
        system_instruction: String,
        input_rx: mpsc::Receiver<RuntimeInput>,
        input_tx: mpsc::WeakSender<RuntimeInput>,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> Self {
        let llm_client = Arc::new(llm_client);
        Self {
            context,
            state: ConvState::Intro,
            transcript: Transcript::new(),
            sessions: SessionLifecycle::new(llm_client.clone(), system_instruction),
            llm_client,
            input_rx,
            input_tx,
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Starting conversation runtime");

        while let Some(input) = self.input_rx.recv().await {
            match input {
                RuntimeInput::Command { event, reply } => {
                    let result = self.process_event(event).await;
                    if let Err(e) = &result {
                        tracing::debug!(error = %e, state = self.state.name(), "Rejected user action");
                    }
                    // The caller may have gone away; nothing to do then
                    let _ = reply.send(result);
                }
                RuntimeInput::Stream(event) => {
                    let reply_id = event.reply_id().cloned();
                    if let Err(e) = self.process_event(event).await {
                        tracing::warn!(
                            reply_id = ?reply_id,
                            current = ?self.state.reply_id(),
                            error = %e,
                            state = self.state.name(),
                            "Dropped stream event"
                        );
                    }
                }
                RuntimeInput::Snapshot(reply) => {
                    let _ = reply.send(self.view());
                }
            }
        }

        tracing::info!("Conversation runtime stopped");
    }

    fn view(&self) -> ConversationView {
        ConversationView {
            phase: if self.state == ConvState::Intro {
                Phase::Intro
            } else {
                Phase::Chat
            },
            busy: self.state.is_busy(),
            turns: self.transcript.snapshot(),
        }
    }

    async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        // Effects may generate follow-up events (a session that cannot be
        // created fails the cycle right away)
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            if let Event::StreamFailed {
                reply_id, message, ..
            } = &current_event
            {
                tracing::warn!(reply_id = %reply_id, reason = %message, "Request cycle failed");
            }

            // Pure state transition
            let result = transition(&self.state, &self.context, current_event)?;

            let old_state = std::mem::replace(&mut self.state, result.new_state);
            if old_state.name() != self.state.name() {
                tracing::debug!(from = old_state.name(), to = self.state.name(), "State changed");
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(())
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::AppendTurn(turn) => {
                let json = turn.to_json();
                match self.transcript.append(turn) {
                    Ok(()) => self.broadcast(SseEvent::TurnAppended { turn: json }),
                    Err(e) => tracing::error!(error = %e, "Failed to append turn"),
                }
                None
            }

            Effect::UpdateText { id, text } => {
                let result = self.transcript.update_text(&id, &text);
                self.after_turn_change(&id, result.map_err(|e| e.to_string()));
                None
            }

            Effect::FinalizeTurn { id } => {
                let result = self.transcript.finalize(&id);
                self.after_turn_change(&id, result.map_err(|e| e.to_string()));
                None
            }

            Effect::FailTurn { id } => {
                let result = self.transcript.mark_failed(&id);
                self.after_turn_change(&id, result.map_err(|e| e.to_string()));
                None
            }

            Effect::ResetTranscript { seed } => {
                let dropped = self.transcript.len();
                self.transcript.reset(seed);
                tracing::info!(dropped, "Transcript reset");
                let turns = self.transcript.snapshot().iter().map(Turn::to_json).collect();
                self.broadcast(SseEvent::TranscriptReset { turns });
                None
            }

            Effect::ResetSession => {
                if self.sessions.is_live() {
                    self.sessions.reset_session();
                }
                None
            }

            Effect::OpenStream { reply_id, text } => {
                let session = match self.sessions.ensure_session().await {
                    Ok(session) => session,
                    Err(e) => {
                        tracing::error!(reply_id = %reply_id, error = %e, "Failed to create model session");
                        return Some(Event::stream_failed(reply_id, e.message));
                    }
                };
                self.spawn_stream(session, reply_id, text)
            }

            Effect::NotifyState { busy } => {
                self.broadcast(SseEvent::StateChange {
                    state: self.state.name().to_string(),
                    busy,
                });
                None
            }
        }
    }

    fn after_turn_change(&self, id: &TurnId, result: Result<(), String>) {
        if let Err(e) = result {
            tracing::error!(turn_id = %id, error = %e, "Failed to update turn");
            return;
        }
        if let Some(turn) = self.transcript.get(id) {
            self.broadcast(SseEvent::TurnUpdated {
                turn: turn.to_json(),
            });
        }
    }

    /// Start consuming the reply stream in its own task
    fn spawn_stream(&self, session: SessionHandle, reply_id: TurnId, text: String) -> Option<Event> {
        let Some(input_tx) = self.input_tx.upgrade() else {
            return Some(Event::stream_failed(reply_id, "Runtime is shutting down"));
        };

        tracing::debug!(
            reply_id = %reply_id,
            session = self.sessions.generation(),
            history = session.history_len(),
            "Opening reply stream"
        );
        let llm_client = self.llm_client.clone();
        tokio::spawn(consume_stream(llm_client, session, reply_id, text, input_tx));
        None
    }

    fn broadcast(&self, event: SseEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }
}

/// Forward the reply stream of one cycle onto the runtime queue
async fn consume_stream<L: LlmClient>(
    llm_client: Arc<L>,
    session: SessionHandle,
    reply_id: TurnId,
    text: String,
    input_tx: mpsc::Sender<RuntimeInput>,
) {
    let guard = CycleGuard::new(reply_id.clone(), input_tx);

    let mut fragments = match llm_client.send_and_stream(&session, &text).await {
        Ok(fragments) => fragments,
        Err(e) => {
            guard.finish(Event::stream_failed(reply_id, e.message)).await;
            return;
        }
    };

    if !guard
        .send(Event::StreamOpened {
            reply_id: reply_id.clone(),
        })
        .await
    {
        return;
    }

    let mut count = 0usize;
    while let Some(item) = fragments.next().await {
        match item {
            Ok(fragment) => {
                count += 1;
                let event = Event::Fragment {
                    reply_id: reply_id.clone(),
                    text: fragment,
                };
                if !guard.send(event).await {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(reply_id = %reply_id, fragments = count, error = %e, "Reply stream failed");
                guard.finish(Event::stream_failed(reply_id, e.message)).await;
                return;
            }
        }
    }

    tracing::debug!(reply_id = %reply_id, fragments = count, "Reply stream finished");
    guard.finish(Event::StreamEnded { reply_id }).await;
}

/// Held by a stream task for its whole cycle.
///
/// The runtime only leaves the busy state on a terminal stream event. If the
/// task ends without sending one (panic, abort), dropping the guard sends a
/// failure instead.
struct CycleGuard {
    reply_id: TurnId,
    input_tx: mpsc::Sender<RuntimeInput>,
    armed: bool,
}

impl CycleGuard {
    fn new(reply_id: TurnId, input_tx: mpsc::Sender<RuntimeInput>) -> Self {
        Self {
            reply_id,
            input_tx,
            armed: true,
        }
    }

    /// Returns false once the runtime is gone
    async fn send(&self, event: Event) -> bool {
        self.input_tx.send(RuntimeInput::Stream(event)).await.is_ok()
    }

    /// Send the terminal event of the cycle
    async fn finish(mut self, event: Event) {
        self.armed = false;
        let _ = self.send(event).await;
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        tracing::error!(reply_id = %self.reply_id, "Reply stream task ended without a result");
        let event = RuntimeInput::Stream(Event::stream_failed(
            self.reply_id.clone(),
            "Stream task ended unexpectedly",
        ));
        match self.input_tx.try_send(event) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                let input_tx = self.input_tx.clone();
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        let _ = input_tx.send(event).await;
                    });
                }
            }
        }
    }
}

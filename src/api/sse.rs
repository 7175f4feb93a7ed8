//! Server-Sent Events support

use crate::runtime::SseEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Create stream that starts with init event then broadcasts
    let init = futures::stream::once(async move { Ok(sse_event_to_axum(init_event)) });

    // A subscriber that lagged has lost events for good. Ending the stream
    // makes the client reconnect and start over from a fresh init.
    let broadcasts = BroadcastStream::new(broadcast_rx).map_while(|result| match result {
        Ok(event) => Some(Ok(sse_event_to_axum(event))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber lagged, closing stream");
            None
        }
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

pub(super) fn event_name(event: &SseEvent) -> &'static str {
    match event {
        SseEvent::Init { .. } => "init",
        SseEvent::TurnAppended { .. } => "turn_appended",
        SseEvent::TurnUpdated { .. } => "turn_updated",
        SseEvent::TranscriptReset { .. } => "transcript_reset",
        SseEvent::StateChange { .. } => "state_change",
    }
}

pub(super) fn event_data(event: SseEvent) -> serde_json::Value {
    match event {
        SseEvent::Init { conversation } => json!({
            "type": "init",
            "conversation": conversation
        }),
        SseEvent::TurnAppended { turn } => json!({
            "type": "turn_appended",
            "turn": turn
        }),
        SseEvent::TurnUpdated { turn } => json!({
            "type": "turn_updated",
            "turn": turn
        }),
        SseEvent::TranscriptReset { turns } => json!({
            "type": "transcript_reset",
            "turns": turns
        }),
        SseEvent::StateChange { state, busy } => json!({
            "type": "state_change",
            "state": state,
            "busy": busy
        }),
    }
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let name = event_name(&event);
    Event::default()
        .event(name)
        .data(event_data(event).to_string())
}

//! Server-Sent Events support

use crate::runtime::{SessionSnapshot, SseEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream, starting with the current snapshot
pub fn sse_stream(
    init: SessionSnapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move {
        Ok(to_axum_event(
            "init",
            json!({ "type": "init", "session": init }),
        ))
    });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(sse_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = match event {
        SseEvent::Message { message } => (
            "message",
            json!({ "type": "message", "message": message }),
        ),
        SseEvent::Typing { is_typing } => (
            "typing",
            json!({ "type": "typing", "is_typing": is_typing }),
        ),
        SseEvent::QuickReplies { options } => (
            "quick_replies",
            json!({ "type": "quick_replies", "options": options }),
        ),
        SseEvent::StepChange { step } => (
            "step_change",
            json!({ "type": "step_change", "step": step }),
        ),
        SseEvent::Assessment { assessment } => (
            "assessment",
            json!({ "type": "assessment", "assessment": assessment }),
        ),
        SseEvent::Reset { session } => (
            "reset",
            json!({ "type": "reset", "session": session }),
        ),
        SseEvent::Error { message } => (
            "error",
            json!({ "type": "error", "message": message }),
        ),
    };

    to_axum_event(event_type, data)
}

fn to_axum_event(event_type: &str, data: serde_json::Value) -> Event {
    Event::default().event(event_type).data(data.to_string())
}

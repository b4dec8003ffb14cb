//! Server-Sent Events support

use super::types::MessageView;
use crate::runtime::{ChatEvent, Snapshot};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream, starting with a full snapshot
pub fn sse_stream(
    init: Snapshot,
    broadcast_rx: tokio::sync::broadcast::Receiver<ChatEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init = futures::stream::once(async move { Ok(to_axum("init", init_payload(&init))) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => {
            let (event_type, data) = chat_event_payload(event);
            Some(Ok(to_axum(event_type, data)))
        }
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn init_payload(snapshot: &Snapshot) -> Value {
    json!({
        "type": "init",
        "authenticated": snapshot.authenticated,
        "state": snapshot.state,
        "awaiting_response": snapshot.state.is_awaiting(),
        "draft": snapshot.draft,
        "reply_target": snapshot.reply_target,
        "messages": MessageView::from_conversation(&snapshot.messages),
    })
}

fn chat_event_payload(event: ChatEvent) -> (&'static str, Value) {
    match event {
        ChatEvent::Message {
            message,
            reply_quote,
        } => (
            "message",
            json!({
                "type": "message",
                "message": MessageView::new(&message, reply_quote)
            }),
        ),
        ChatEvent::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "awaiting_response": state.is_awaiting(),
                "state": state
            }),
        ),
        ChatEvent::Cleared => (
            "cleared",
            json!({
                "type": "cleared"
            }),
        ),
    }
}

fn to_axum(event_type: &str, data: Value) -> Event {
    Event::default().event(event_type).data(data.to_string())
}

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::state::AppState;

/// Realtime event stream (SSE).
///
/// The first event is always a synthetic `model:status` snapshot so late
/// subscribers immediately know the current residency. Subsequent events
/// mirror the bus; a subscriber that falls behind loses old events instead
/// of slowing publishers down.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "events",
    responses((status = 200, description = "Server-sent event stream"))
)]
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let snapshot = state.models.snapshot();
    let initial = stream::once(async move {
        Event::default().event("model:status").json_data(&snapshot)
    });

    let live = BroadcastStream::new(state.bus.subscribe()).filter_map(|item| async move {
        match item {
            Ok(event) => Some(Event::default().event(event.channel()).json_data(&event)),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::debug!(missed = missed, "SSE subscriber lagged, events dropped");
                None
            }
        }
    });

    Sse::new(initial.chain(live)).keep_alive(KeepAlive::default())
}

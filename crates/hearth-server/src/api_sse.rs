//! SSE stream handlers for the real-time broadcast channels.

use crate::AppState;
use axum::{
    extract::{Extension, Path},
    response::{sse::Event, Sse},
};
use futures_util::Stream;
use hearth_broadcast::Envelope;
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

fn envelope_to_sse(
    result: Result<Envelope, tokio_stream::wrappers::errors::BroadcastStreamRecvError>,
) -> Option<Result<Event, Infallible>> {
    match result {
        Ok(envelope) => match serde_json::to_string(&envelope.data) {
            Ok(data) => Some(Ok(Event::default().event(envelope.event).data(data))),
            Err(e) => {
                tracing::error!(event = envelope.event, "failed to serialize broadcast payload: {}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!(
                error = %e,
                "SSE subscriber lagged; events were dropped for this subscriber"
            );
            None
        }
    }
}

/// Handler for `GET /events/stream`.
///
/// Streams every broadcast event: signals, readings, triggers, progress
/// payloads, and pipeline timelines.
pub async fn get_event_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe_all();
    let stream = BroadcastStream::new(rx).filter_map(envelope_to_sse);

    Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::default())
}

/// Handler for `GET /events/device/{deviceId}`.
///
/// Streams only events scoped to one device (or sync/pairing operation key),
/// delivered under the device-scoped event names.
pub async fn get_device_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe_group(&device_id);
    let stream = BroadcastStream::new(rx).filter_map(envelope_to_sse);

    Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::default())
}

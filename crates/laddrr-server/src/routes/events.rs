use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events: SSE stream with one event per collection change.
///
/// The event name is the collection key. A client that falls behind gets a
/// single `resync` event and should re-read everything it displays.
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.store.subscribe_all();
    let stream = BroadcastStream::new(rx).map(|msg| {
        let event = match msg {
            Ok(change) => Event::default().event(change.key.clone()).data(change.key),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::debug!(missed, "sse client lagged");
                Event::default().event("resync").data(missed.to_string())
            }
        };
        Ok::<Event, Infallible>(event)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

//! Live-stream endpoint: a persistent SSE connection per viewer, fed by the
//! fan-out bridge. The response opens with a `connected` frame and carries
//! periodic comment-only keep-alives so idle connections survive
//! intermediaries.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::AppState;
use crate::stream::FanOutBridge;

/// Query parameters for the live-stream endpoint
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Comma-separated subscription keys; absent means receive everything
    pub vins: Option<String>,
}

/// SSE connection handler
pub async fn telemetry_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    let filter = parse_filter(query.vins.as_deref());

    let (client_id, rx) = match state.bridge.connect(filter).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::error!(error = %e, "Live-stream connect failed");
            return crate::error::AppError::from(e).into_response();
        }
    };

    tracing::info!(client_id = %client_id, "Live-stream client connected");

    let keep_alive_secs = state.bridge.config().keep_alive_secs;
    let stream = client_stream(rx, client_id, Arc::clone(&state.bridge));

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(keep_alive_secs))
                .text("keep-alive"),
        )
        .into_response()
}

/// Parse the comma-separated filter parameter; empty input means no filter
fn parse_filter(raw: Option<&str>) -> Option<HashSet<String>> {
    let raw = raw?;
    let keys: HashSet<String> = raw
        .split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if keys.is_empty() {
        None
    } else {
        Some(keys)
    }
}

/// Build the per-client event stream. The cleanup guard unregisters the
/// client when the transport closes and the stream is dropped.
fn client_stream(
    mut rx: mpsc::Receiver<Arc<str>>,
    client_id: Uuid,
    bridge: Arc<FanOutBridge>,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    let guard = CleanupGuard { client_id, bridge };

    async_stream::stream! {
        let _guard = guard;

        yield Ok(Event::default()
            .event("connected")
            .data(format!(r#"{{"client_id":"{}"}}"#, client_id)));

        while let Some(frame) = rx.recv().await {
            yield Ok(Event::default().event("telemetry").data(frame.as_ref()));
        }
    }
}

/// Removes the client from the registry when dropped
struct CleanupGuard {
    client_id: Uuid,
    bridge: Arc<FanOutBridge>,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        tracing::info!(client_id = %self.client_id, "Live-stream client disconnected");
        self.bridge.disconnect(&self.client_id);
    }
}

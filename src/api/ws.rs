// =============================================================================
// WebSocket Handler — push-based dashboard updates
// =============================================================================
//
// Clients connect to `/api/v1/ws?names=SMA_20,RSI` and receive:
//   1. The current dashboard payload on connect (once data is loaded).
//   2. A fresh payload every time `state_version` changes, checked every
//      500 ms.
//
// A text frame from the client replaces the connection's indicator selection
// (comma-separated names, unknown ones ignored) and triggers an immediate
// push. Ping frames are answered with Pong.
// =============================================================================

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::api::rest::SelectionQuery;
use crate::app_state::AppState;
use crate::pipeline::IndicatorRequest;

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SelectionQuery>,
) -> impl IntoResponse {
    let request = state
        .indicator_request(query.names.as_deref(), false)
        .unwrap_or_else(|_| state.runtime_config.read().default_request());

    info!(indicators = request.kinds.len(), "WebSocket connection accepted, upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, request))
}

// =============================================================================
// Connection handler
// =============================================================================

/// Runs the push loop and the receive loop concurrently via `tokio::select!`
/// until either side closes.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>, mut request: IndicatorRequest) {
    let (mut sender, mut receiver) = socket.split();

    let mut sequence: u64 = 0;
    let mut last_sent_version: u64 = 0;

    let loaded = state.cache.read().is_populated();
    if loaded {
        if let Err(e) = send_dashboard(&mut sender, &state, &request, &mut sequence).await {
            warn!(error = %e, "failed to send initial WebSocket payload");
            return;
        }
        last_sent_version = state.current_state_version();
    }

    let mut push_interval = interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                let current_version = state.current_state_version();
                let loaded = state.cache.read().is_populated();
                if current_version == last_sent_version || !loaded {
                    continue;
                }
                if let Err(e) = send_dashboard(&mut sender, &state, &request, &mut sequence).await {
                    debug!(error = %e, "WebSocket send failed, disconnecting");
                    break;
                }
                last_sent_version = current_version;
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let params = state.runtime_config.read().indicator_params.clone();
                        request = IndicatorRequest::parse(text.split(',').filter(|s| !s.trim().is_empty()))
                            .with_params(params);
                        debug!(selection = %text, "WebSocket indicator selection changed");
                        // Force a push on the next tick.
                        last_sent_version = 0;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "failed to send Pong, disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Binary(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket Close frame received");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error, disconnecting");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    info!(messages = sequence, "WebSocket connection closed");
}

// =============================================================================
// Helpers
// =============================================================================

/// Serialize and send the dashboard payload for `request`.
async fn send_dashboard<S>(
    sender: &mut S,
    state: &Arc<AppState>,
    request: &IndicatorRequest,
    sequence: &mut u64,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let Some(payload) = state.build_dashboard(request) else {
        return Ok(());
    };

    match serde_json::to_string(&payload) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            state.ws_sequence_number.fetch_add(1, Ordering::Relaxed);
            *sequence += 1;
            debug!(
                version = payload.state_version,
                seq = *sequence,
                "WebSocket payload sent"
            );
            Ok(())
        }
        Err(e) => {
            // Not a network error; keep the connection.
            warn!(error = %e, "failed to serialize dashboard payload");
            Ok(())
        }
    }
}

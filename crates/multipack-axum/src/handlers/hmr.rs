//! Live-update WebSocket.
//!
//! `GET {hmr_path}?target=<t>` upgrades to a WebSocket subscribed to the
//! target's update channel. The first frame is always the `sync` message;
//! `building` and `built` follow in emission order. Client frames are
//! ignored apart from close.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use multipack_core::Target;
use tracing::debug;

use crate::dto::TargetQuery;
use crate::error::HttpError;
use crate::state::AppState;

/// Upgrade to a live-update subscription.
pub async fn connect(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<TargetQuery>,
) -> Result<Response, HttpError> {
    let name = query
        .explicit()
        .ok_or_else(|| HttpError::BadRequest("Missing ?target= for live updates".to_string()))?;
    let target = state
        .resolver
        .recognize(name)
        .ok_or_else(|| HttpError::BadRequest(format!("Unknown target: {name}")))?;

    Ok(ws.on_upgrade(move |socket| subscribe(socket, state, target)))
}

async fn subscribe(socket: WebSocket, state: AppState, target: Target) {
    let id = state.channels.next_connection_id();
    let mut updates = state.channels.subscribe(&target, id);
    debug!(target = %target, connection = %id, "Live-update client connected");

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                let text = match serde_json::to_string(&update) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to serialize update: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            () = state.shutdown.cancelled() => break,
        }
    }

    state.channels.unsubscribe(&target, id);
    debug!(target = %target, connection = %id, "Live-update client disconnected");
}

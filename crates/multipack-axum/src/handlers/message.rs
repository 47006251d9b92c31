//! Control WebSocket and reload trigger.

use axum::Json;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tracing::debug;

use crate::state::AppState;

/// `GET /message`
pub async fn connect(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| relay(socket, state))
}

async fn relay(socket: WebSocket, state: AppState) {
    let (id, mut outgoing) = state.control.connect();
    debug!(client = id, "Control client connected");

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            text = outgoing.recv() => {
                let Some(text) = text else { break };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    state.control.relay(id, text.as_str());
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            () = state.shutdown.cancelled() => break,
        }
    }

    state.control.disconnect(id);
    debug!(client = id, "Control client disconnected");
}

/// `POST /reload`
///
/// Tells every connected control client to reload.
pub async fn reload(State(state): State<AppState>) -> Json<Value> {
    let clients = state.control.broadcast(&json!({ "method": "reload" }).to_string());
    state.logger.info(
        "Reloading connected clients",
        Some(json!({ "clients": clients })),
    );
    Json(json!({ "clients": clients }))
}

//! Real-time notification delivery over WebSocket
//!
//! Clients connect with `GET /ws?token=<access token>`. The token is checked
//! before the upgrade; afterwards the socket receives every notification
//! pushed for that user and answers `{"type":"ping"}` with `{"type":"pong"}`.

use super::error::{ApiError, ApiResult};
use super::extract::authenticate;
use super::ApiState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

const TOKEN_REQUIRED: &str = "Authentication token is required.";
const UPGRADE_REQUIRED: &str = "WebSocket upgrade required.";

/// Messages a client may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Pong,
}

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Authenticate, then upgrade. The token is checked even when the request is
/// not a valid upgrade so a bad token always answers 401.
pub async fn websocket_handler(
    ws: Option<WebSocketUpgrade>,
    Query(params): Query<WsQuery>,
    State(state): State<ApiState>,
) -> ApiResult<Response> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized(TOKEN_REQUIRED))?;
    let (user, _) = authenticate(&state, &token).await?;
    let ws = ws.ok_or_else(|| ApiError::error(StatusCode::UPGRADE_REQUIRED, UPGRADE_REQUIRED))?;
    info!("WebSocket connection requested by user {}", user.id);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user.id)))
}

async fn handle_socket(socket: WebSocket, state: ApiState, user_id: i32) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = BroadcastStream::new(state.hub.subscribe(user_id).await);
    let (reply_tx, mut reply_rx) = mpsc::channel::<Value>(8);

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Some(reply) = reply_to(&text) {
                        if reply_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                update = updates.next() => match update {
                    Some(Ok(payload)) => payload,
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!("WebSocket for user {} lagged, {} notification(s) dropped", user_id, skipped);
                        continue;
                    }
                    None => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };
            if sender.send(Message::Text(outgoing.to_string())).await.is_err() {
                break;
            }
        }
    });

    // The aborted task must be joined so its hub receiver is dropped before pruning
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = (&mut recv_task) => {
            send_task.abort();
            let _ = send_task.await;
        }
    }

    state.hub.prune().await;
    info!("WebSocket connection closed for user {}", user_id);
}

/// Reply owed for an incoming text frame, if any
fn reply_to(text: &str) -> Option<Value> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => serde_json::to_value(ClientMessage::Pong).ok(),
        Ok(ClientMessage::Pong) => None,
        Err(e) => {
            debug!("Ignoring WebSocket message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ping_gets_pong() {
        assert_eq!(reply_to(r#"{"type":"ping"}"#), Some(json!({"type": "pong"})));
        assert_eq!(reply_to(r#"{"type":"pong"}"#), None);
        assert_eq!(reply_to("hello"), None);
    }
}

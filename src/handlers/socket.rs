use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::{extract_jwt_from_headers, validate_jwt};
use crate::middleware::AuthUser;
use crate::oplog::{Caller, OpAck};
use crate::services::SyncService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SocketQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    SyncOps(Vec<Value>),
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Connected(Connected),
    Pong,
    Ack(Vec<OpAck>),
    Error(SocketError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    pub user_id: Uuid,
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SocketError {
    pub message: String,
}

/// GET /ws - Upgrade to the sync channel
///
/// The token comes from the Authorization header or, for clients that
/// cannot set headers on the handshake, the `token` query parameter.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    headers: HeaderMap,
) -> Response {
    let token = match extract_jwt_from_headers(&headers).ok().or(query.token) {
        Some(token) => token,
        None => return ApiError::unauthorized("Missing token").into_response(),
    };
    let auth_user = match validate_jwt(&token, &state.config.security.jwt_secret) {
        Ok(claims) => AuthUser::from(claims),
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    ws.on_upgrade(move |socket| session(socket, state, auth_user))
}

async fn session(socket: WebSocket, state: AppState, auth_user: AuthUser) {
    let (mut sender, mut receiver) = socket.split();
    let sync = state.sync();
    let caller = auth_user.caller();

    tracing::info!(user_id = %auth_user.user_id, "Sync socket connected");
    let hello = ServerMessage::Connected(Connected {
        user_id: auth_user.user_id,
        server_time: Utc::now(),
    });
    if send(&mut sender, &hello).await.is_err() {
        return;
    }

    while let Some(incoming) = receiver.next().await {
        let reply = match incoming {
            Ok(Message::Text(text)) => handle_text(&sync, &caller, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(user_id = %auth_user.user_id, error = %e, "Sync socket read failed");
                break;
            }
        };
        if send(&mut sender, &reply).await.is_err() {
            break;
        }
    }

    tracing::info!(user_id = %auth_user.user_id, "Sync socket closed");
}

async fn handle_text(sync: &SyncService, caller: &Caller, text: &str) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => ServerMessage::Pong,
        Ok(ClientMessage::SyncOps(ops)) => match sync.sync_batch(caller, 0, ops).await {
            Ok(outcome) => ServerMessage::Ack(outcome.acks),
            Err(e) => ServerMessage::Error(SocketError { message: e.to_string() }),
        },
        Err(e) => ServerMessage::Error(SocketError {
            message: format!("Unrecognized message: {}", e),
        }),
    }
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    sender.send(Message::Text(text)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_decode() {
        let ping: ClientMessage = serde_json::from_value(json!({"type": "PING"})).unwrap();
        assert!(matches!(ping, ClientMessage::Ping));

        let sync: ClientMessage = serde_json::from_value(json!({"type": "SYNC_OPS", "payload": [{"opId": "x"}]})).unwrap();
        assert!(matches!(sync, ClientMessage::SyncOps(ops) if ops.len() == 1));
    }

    #[test]
    fn server_messages_encode() {
        assert_eq!(serde_json::to_value(ServerMessage::Pong).unwrap(), json!({"type": "PONG"}));
        let ack = serde_json::to_value(ServerMessage::Ack(vec![])).unwrap();
        assert_eq!(ack, json!({"type": "ACK", "payload": []}));
    }
}

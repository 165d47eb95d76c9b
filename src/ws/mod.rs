//! Room chat over WebSocket.
//!
//! Players connect with `?roomId=` for a room the registry knows. Every text
//! frame is one chat line. In AI rooms the line goes through the chat relay
//! and the reply comes back on the same socket; in human rooms it is passed to
//! the other players in the room.

pub mod session;

pub use session::{ChatHub, ChatSession, PeerMessage, AI_APOLOGY};

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::chat::ChatRelay;
use crate::registry::Registry;
use crate::types::RoomId;

/// Shared state of the chat service
pub struct ChatState {
    pub registry: Arc<Registry>,
    pub relay: ChatRelay,
    pub hub: ChatHub,
}

impl ChatState {
    pub fn new(registry: Arc<Registry>, relay: ChatRelay) -> Self {
        Self {
            registry,
            relay,
            hub: ChatHub::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    pub room_id: Option<RoomId>,
}

pub fn chat_router(state: Arc<ChatState>) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(state)
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ChatQuery>,
    State(state): State<Arc<ChatState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request: room_id={:?}", params.room_id);

    ws.on_upgrade(move |socket| handle_socket(socket, params.room_id, state))
}

async fn handle_socket(mut socket: WebSocket, room_id: Option<RoomId>, state: Arc<ChatState>) {
    let room = match room_id {
        Some(room_id) => state.registry.get_room(&room_id).await.ok(),
        None => None,
    };
    let Some(room) = room else {
        tracing::warn!("Rejecting chat connection for an unknown room");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "invalid or unauthorized room".into(),
            })))
            .await;
        return;
    };

    let session = state.hub.join(&room.room_id, room.is_ai_room).await;
    let client_id = ulid::Ulid::new().to_string();
    let mut peers = session.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Lines from the other players in a human room
            peer = peers.recv() => {
                match peer {
                    Ok(msg) if msg.is_from(&client_id) => {}
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(room_id = %room.room_id, skipped, "Chat client lagging behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(room_id = %room.room_id, "Received chat line");
                        let reply = session
                            .handle_text(&state.relay, &client_id, text.as_str().to_owned())
                            .await;
                        if let Some(reply) = reply {
                            if sender.send(Message::Text(reply.into())).await.is_err() {
                                tracing::error!("Failed to send AI reply");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.hub.leave(session.room_id()).await;
    tracing::info!(room_id = %room.room_id, "Chat connection closed");
}

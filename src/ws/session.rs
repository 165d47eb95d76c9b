//! Live conversations, one per room that has connected players.

use crate::chat::ChatRelay;
use crate::types::{ChatMessage, RoomId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// What the player sees when the AI opponent cannot answer
pub const AI_APOLOGY: &str = "sorry, got a bit of a headache right now. try again later.";

const PEER_CHANNEL_CAPACITY: usize = 64;

/// A line one player typed, on its way to the others in a human room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerMessage {
    pub from: String,
    pub text: String,
}

impl PeerMessage {
    pub fn is_from(&self, client_id: &str) -> bool {
        self.from == client_id
    }
}

pub struct ChatSession {
    room_id: RoomId,
    is_ai_room: bool,
    /// Only grows in AI rooms; the relay sees all of it on every turn
    transcript: Mutex<Vec<ChatMessage>>,
    peers: broadcast::Sender<PeerMessage>,
}

impl ChatSession {
    fn new(room_id: RoomId, is_ai_room: bool) -> Self {
        let (peers, _) = broadcast::channel(PEER_CHANNEL_CAPACITY);
        Self {
            room_id,
            is_ai_room,
            transcript: Mutex::new(Vec::new()),
            peers,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn is_ai_room(&self) -> bool {
        self.is_ai_room
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PeerMessage> {
        self.peers.subscribe()
    }

    /// Handle one line typed by `client_id`. Returns the text to send back to
    /// that same client, if any.
    ///
    /// AI rooms answer through the relay. Human rooms pass the line to the
    /// other players and answer nothing.
    pub async fn handle_text(
        &self,
        relay: &ChatRelay,
        client_id: &str,
        text: String,
    ) -> Option<String> {
        if self.is_ai_room {
            Some(self.ask_ai(relay, text).await)
        } else {
            self.publish(client_id, text);
            None
        }
    }

    /// The lock is held across the model call so turns stay in order.
    async fn ask_ai(&self, relay: &ChatRelay, text: String) -> String {
        let mut transcript = self.transcript.lock().await;
        transcript.push(ChatMessage::user(text));

        match relay.reply(&transcript).await {
            Ok(reply) => {
                transcript.push(ChatMessage::assistant(reply.clone()));
                tracing::debug!(room_id = %self.room_id, "AI reply sent");
                reply
            }
            Err(e) => {
                tracing::error!(room_id = %self.room_id, "AI opponent failed to answer: {}", e);
                AI_APOLOGY.to_string()
            }
        }
    }

    fn publish(&self, client_id: &str, text: String) {
        // No other receivers is fine
        let _ = self.peers.send(PeerMessage {
            from: client_id.to_string(),
            text,
        });
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().await.clone()
    }
}

struct Membership {
    session: Arc<ChatSession>,
    clients: usize,
}

/// Open chat sessions by room. A session exists while at least one player is
/// connected; the room's registry entry and votes are not touched.
#[derive(Default)]
pub struct ChatHub {
    sessions: Mutex<HashMap<RoomId, Membership>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(&self, room_id: &str, is_ai_room: bool) -> Arc<ChatSession> {
        let mut sessions = self.sessions.lock().await;
        let membership = sessions
            .entry(room_id.to_string())
            .or_insert_with(|| Membership {
                session: Arc::new(ChatSession::new(room_id.to_string(), is_ai_room)),
                clients: 0,
            });
        membership.clients += 1;
        tracing::info!(room_id, clients = membership.clients, "Player joined chat");
        membership.session.clone()
    }

    pub async fn leave(&self, room_id: &str) {
        let mut sessions = self.sessions.lock().await;
        let Some(membership) = sessions.get_mut(room_id) else {
            return;
        };
        membership.clients = membership.clients.saturating_sub(1);
        tracing::info!(room_id, clients = membership.clients, "Player left chat");
        if membership.clients == 0 {
            sessions.remove(room_id);
            tracing::info!(room_id, "Chat room empty, closed");
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn client_count(&self, room_id: &str) -> usize {
        self.sessions
            .lock()
            .await
            .get(room_id)
            .map_or(0, |m| m.clients)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type RoomId = String;
pub type VoteId = String;

/// One side of a conversation: either a person or the scripted AI.
///
/// Used both for who cast a vote and for what the vote guessed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    #[default]
    Human,
    Ai,
}

impl Party {
    /// The party a boolean "is it an AI" ground truth refers to
    pub fn from_is_ai(is_ai: bool) -> Self {
        if is_ai {
            Party::Ai
        } else {
            Party::Human
        }
    }

    /// Parse the literal lower-case token used on the wire
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "human" => Some(Party::Human),
            "ai" => Some(Party::Ai),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Human => "human",
            Party::Ai => "ai",
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single guess recorded against a room. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: VoteId,
    pub voter: Party,
    pub guess: Party,
    /// Fixed at submission time, never recomputed
    pub correct: bool,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: RoomId,
    pub is_ai_room: bool,
    /// Append-only, in submission order
    pub votes: Vec<Vote>,
}

impl Room {
    pub fn new(room_id: RoomId, is_ai_room: bool) -> Self {
        Self {
            room_id,
            is_ai_room,
            votes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// One entry of a conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

//! In-memory room/vote registry.
//!
//! Rooms live for the life of the process. The room map sits behind an
//! `RwLock`, and every room has its own `Mutex`, so votes on one room never
//! wait for votes on another while a reset and an append on the same room are
//! always serialized.

mod stats;
mod vote;

pub use stats::{OverallStats, Stats, StratumStats};
pub use vote::VoteInput;

use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Errors surfaced by registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

type RoomSlot = Arc<Mutex<Room>>;

#[derive(Default)]
pub struct Registry {
    rooms: RwLock<HashMap<RoomId, RoomSlot>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room, or reset an existing one to an empty vote log.
    ///
    /// The reset happens in place under the room's own lock, so a vote racing
    /// with it lands either before the reset (and is cleared) or after it.
    pub async fn register_room(&self, room_id: RoomId, is_ai_room: bool) {
        let slot = {
            let mut rooms = self.rooms.write().await;
            rooms
                .entry(room_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Room::new(room_id.clone(), is_ai_room))))
                .clone()
        };

        let mut room = slot.lock().await;
        let cleared = room.votes.len();
        room.is_ai_room = is_ai_room;
        room.votes.clear();

        if cleared > 0 {
            tracing::info!(
                room_id = %room_id,
                is_ai_room,
                cleared,
                "Room re-registered, vote log reset"
            );
        } else {
            tracing::info!(room_id = %room_id, is_ai_room, "Room registered");
        }
    }

    /// Snapshot of a single room, including its full vote log
    pub async fn get_room(&self, room_id: &str) -> RegistryResult<Room> {
        let slot = self.slot(room_id).await?;
        let room = slot.lock().await;
        Ok(room.clone())
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn slot(&self, room_id: &str) -> RegistryResult<RoomSlot> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.to_string()))
    }

    /// All room slots, cloned out so the map lock is not held while rooms are locked
    async fn slots(&self) -> Vec<RoomSlot> {
        self.rooms.read().await.values().cloned().collect()
    }
}

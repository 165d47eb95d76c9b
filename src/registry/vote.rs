use super::{Registry, RegistryResult};
use crate::types::*;

/// A vote after request normalization: every field is explicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteInput {
    pub room_id: RoomId,
    pub guess: Party,
    pub voter: Party,
}

impl VoteInput {
    pub fn new(room_id: impl Into<RoomId>, guess: Party, voter: Party) -> Self {
        Self {
            room_id: room_id.into(),
            guess,
            voter,
        }
    }
}

/// Who the voter was actually talking to.
///
/// A human voter faced the room's designated opponent. The scripted AI only
/// ever talks to a person, so its counterpart is human whatever the room says.
// AI-vs-AI rooms would break the second arm.
pub(crate) fn actual_counterpart(voter: Party, is_ai_room: bool) -> Party {
    match voter {
        Party::Human => Party::from_is_ai(is_ai_room),
        Party::Ai => Party::Human,
    }
}

impl Registry {
    /// Record a vote and report whether the guess was right
    pub async fn submit_vote(&self, input: VoteInput) -> RegistryResult<bool> {
        let slot = self.slot(&input.room_id).await?;
        let mut room = slot.lock().await;

        let correct = input.guess == actual_counterpart(input.voter, room.is_ai_room);

        room.votes.push(Vote {
            id: ulid::Ulid::new().to_string(),
            voter: input.voter,
            guess: input.guess,
            correct,
            cast_at: chrono::Utc::now(),
        });

        tracing::debug!(
            room_id = %input.room_id,
            voter = %input.voter,
            guess = %input.guess,
            correct,
            votes = room.votes.len(),
            "Vote recorded"
        );

        Ok(correct)
    }
}

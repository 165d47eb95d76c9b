//! Pairs incoming players into rooms.
//!
//! A player who finds another human already waiting is paired with them. A
//! player who finds nobody is either sent straight into an AI room (with
//! configurable probability) or parked as the single waiter until a partner
//! arrives or the wait times out. Every room handed out is registered first.

use crate::registry::Registry;
use crate::types::RoomId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Chance that a player with nobody waiting is put against the AI
    pub ai_probability: f64,
    /// How long a lone human waits for a partner
    pub wait_timeout: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            ai_probability: 0.5,
            wait_timeout: Duration::from_secs(120),
        }
    }
}

impl MatchConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ai_probability = std::env::var("MATCH_AI_PROBABILITY")
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 1.0))
            .unwrap_or(defaults.ai_probability);

        let wait_timeout = std::env::var("MATCH_WAIT_TIMEOUT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.wait_timeout);

        tracing::info!(
            ai_probability,
            wait_timeout_secs = wait_timeout.as_secs(),
            "Matchmaking config loaded"
        );

        Self {
            ai_probability,
            wait_timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("no opponent found within {0:?}")]
    WaitTimedOut(Duration),

    #[error("matchmaking was interrupted")]
    Interrupted,
}

struct Waiter {
    ticket: String,
    notify: oneshot::Sender<RoomId>,
}

pub struct Matchmaker {
    registry: Arc<Registry>,
    config: MatchConfig,
    /// At most one human waits at a time
    waiting: Mutex<Option<Waiter>>,
}

impl Matchmaker {
    pub fn new(registry: Arc<Registry>, config: MatchConfig) -> Self {
        Self {
            registry,
            config,
            waiting: Mutex::new(None),
        }
    }

    pub async fn find_match(&self) -> Result<MatchOutcome, MatchError> {
        let (ticket, mut receiver) = {
            let mut waiting = self.waiting.lock().await;

            if let Some(waiter) = waiting.take() {
                if waiter.notify.is_closed() {
                    tracing::info!(ticket = %waiter.ticket, "Waiting player disconnected");
                } else if let Some(room_id) = self.hand_over(waiter).await {
                    // Sent while still holding the lock, see the timeout path below
                    tracing::info!(room_id = %room_id, "Human-human match found");
                    return Ok(MatchOutcome { room_id });
                }
            }

            if rand::random_bool(self.config.ai_probability) {
                drop(waiting);
                let room_id = ulid::Ulid::new().to_string();
                self.registry.register_room(room_id.clone(), true).await;
                tracing::info!(room_id = %room_id, "Starting match against the AI");
                return Ok(MatchOutcome { room_id });
            }

            let (tx, rx) = oneshot::channel();
            let ticket = ulid::Ulid::new().to_string();
            *waiting = Some(Waiter {
                ticket: ticket.clone(),
                notify: tx,
            });
            tracing::info!(ticket = %ticket, "Player waiting for a human opponent");
            (ticket, rx)
        };

        match tokio::time::timeout(self.config.wait_timeout, &mut receiver).await {
            Ok(Ok(room_id)) => Ok(MatchOutcome { room_id }),
            Ok(Err(_)) => Err(MatchError::Interrupted),
            Err(_) => {
                let mut waiting = self.waiting.lock().await;
                if waiting.as_ref().is_some_and(|w| w.ticket == ticket) {
                    *waiting = None;
                    tracing::info!(ticket = %ticket, "Gave up waiting for an opponent");
                    return Err(MatchError::WaitTimedOut(self.config.wait_timeout));
                }
                drop(waiting);
                // Someone took our slot; pairing sends under the lock, so the room is already here
                receiver
                    .try_recv()
                    .map(|room_id| MatchOutcome { room_id })
                    .map_err(|_| MatchError::Interrupted)
            }
        }
    }

    /// Registers a human room and passes it to the parked player. `None` when
    /// that player left in the meantime; the room then stays registered but unused.
    async fn hand_over(&self, waiter: Waiter) -> Option<RoomId> {
        let room_id = ulid::Ulid::new().to_string();
        self.registry.register_room(room_id.clone(), false).await;
        match waiter.notify.send(room_id.clone()) {
            Ok(()) => Some(room_id),
            Err(_) => {
                tracing::warn!(
                    ticket = %waiter.ticket,
                    room_id = %room_id,
                    "Waiting player left before pairing, room left unused"
                );
                None
            }
        }
    }

    /// Whether a human is currently parked waiting for a partner
    #[cfg(test)]
    async fn has_waiting_player(&self) -> bool {
        self.waiting
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.notify.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn matchmaker(ai_probability: f64, wait_ms: u64) -> (Arc<Registry>, Arc<Matchmaker>) {
        let registry = Arc::new(Registry::new());
        let matchmaker = Arc::new(Matchmaker::new(
            registry.clone(),
            MatchConfig {
                ai_probability,
                wait_timeout: Duration::from_millis(wait_ms),
            },
        ));
        (registry, matchmaker)
    }

    #[tokio::test]
    async fn test_ai_match_is_immediate() {
        let (registry, matchmaker) = matchmaker(1.0, 50);

        let outcome = matchmaker.find_match().await.unwrap();

        let room = registry.get_room(&outcome.room_id).await.unwrap();
        assert!(room.is_ai_room);
        assert!(!matchmaker.has_waiting_player().await);
    }

    #[tokio::test]
    async fn test_two_humans_share_a_room() {
        let (registry, matchmaker) = matchmaker(0.0, 5_000);

        let first = {
            let matchmaker = matchmaker.clone();
            tokio::spawn(async move { matchmaker.find_match().await })
        };
        while !matchmaker.has_waiting_player().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let second = matchmaker.find_match().await.unwrap();
        let first = first.await.unwrap().unwrap();

        assert_eq!(first, second);
        let room = registry.get_room(&first.room_id).await.unwrap();
        assert!(!room.is_ai_room);
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_lone_player_times_out() {
        let (registry, matchmaker) = matchmaker(0.0, 30);

        let result = matchmaker.find_match().await;

        assert_eq!(
            result,
            Err(MatchError::WaitTimedOut(Duration::from_millis(30)))
        );
        assert!(!matchmaker.has_waiting_player().await);
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_disconnected_waiter_is_skipped() {
        let (registry, matchmaker) = matchmaker(0.0, 30);

        let abandoned = {
            let matchmaker = matchmaker.clone();
            tokio::spawn(async move { matchmaker.find_match().await })
        };
        while !matchmaker.has_waiting_player().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        abandoned.abort();
        let _ = abandoned.await;

        // The newcomer must not be paired with the player who left
        let result = matchmaker.find_match().await;
        assert!(matches!(result, Err(MatchError::WaitTimedOut(_))));
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_hand_over_to_departed_player() {
        let (registry, matchmaker) = matchmaker(0.0, 30);
        let (notify, receiver) = oneshot::channel();
        drop(receiver);

        let room_id = matchmaker
            .hand_over(Waiter {
                ticket: "gone".to_string(),
                notify,
            })
            .await;

        assert_eq!(room_id, None);
        // The unused room is empty, so it never shows up in the stats
        assert_eq!(registry.room_count().await, 1);
        assert_eq!(registry.get_stats().await.overall.total_votes, 0);
    }

    #[tokio::test]
    async fn test_hand_over_delivers_registered_room() {
        let (registry, matchmaker) = matchmaker(0.0, 30);
        let (notify, receiver) = oneshot::channel();

        let room_id = matchmaker
            .hand_over(Waiter {
                ticket: "t1".to_string(),
                notify,
            })
            .await
            .unwrap();

        assert_eq!(receiver.await.unwrap(), room_id);
        assert!(!registry.get_room(&room_id).await.unwrap().is_ai_room);
    }

    #[test]
    #[serial]
    fn test_match_config_from_env() {
        std::env::set_var("MATCH_AI_PROBABILITY", "7");
        std::env::set_var("MATCH_WAIT_TIMEOUT", "15");
        let config = MatchConfig::from_env();
        std::env::remove_var("MATCH_AI_PROBABILITY");
        std::env::remove_var("MATCH_WAIT_TIMEOUT");

        assert_eq!(config.ai_probability, 1.0);
        assert_eq!(config.wait_timeout, Duration::from_secs(15));

        let config = MatchConfig::from_env();
        assert_eq!(config.ai_probability, 0.5);
        assert_eq!(config.wait_timeout, Duration::from_secs(120));
    }
}

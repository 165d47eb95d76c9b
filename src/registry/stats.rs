use super::Registry;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Accuracy figures for one stratum of votes
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StratumStats {
    pub total: u64,
    pub correct: u64,
    /// `correct / total`, or 0 when there are no votes
    pub accuracy: f64,
}

impl StratumStats {
    fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    fn finish(mut self) -> Self {
        self.accuracy = if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        };
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_votes: u64,
    pub correct_guesses: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    /// Humans guessing about an AI opponent
    pub human_vs_ai: StratumStats,
    /// The scripted AI guessing about its human counterpart
    pub ai_vs_human: StratumStats,
    /// Every vote in every room, including rooms without an AI
    pub overall: OverallStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stratum {
    HumanVsAi,
    AiVsHuman,
}

/// Strata only exist where one side is known to be the AI.
fn stratum_of(is_ai_room: bool, voter: Party) -> Option<Stratum> {
    match (is_ai_room, voter) {
        (true, Party::Human) => Some(Stratum::HumanVsAi),
        (true, Party::Ai) => Some(Stratum::AiVsHuman),
        (false, _) => None,
    }
}

impl Registry {
    /// Aggregate accuracy over every recorded vote
    pub async fn get_stats(&self) -> Stats {
        let mut stats = Stats::default();

        for slot in self.slots().await {
            let room = slot.lock().await;
            for vote in &room.votes {
                stats.overall.total_votes += 1;
                if vote.correct {
                    stats.overall.correct_guesses += 1;
                }

                match stratum_of(room.is_ai_room, vote.voter) {
                    Some(Stratum::HumanVsAi) => stats.human_vs_ai.record(vote.correct),
                    Some(Stratum::AiVsHuman) => stats.ai_vs_human.record(vote.correct),
                    None => {}
                }
            }
        }

        stats.human_vs_ai = stats.human_vs_ai.finish();
        stats.ai_vs_human = stats.ai_vs_human.finish();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VoteInput;

    async fn vote(registry: &Registry, room_id: &str, guess: Party, voter: Party) -> bool {
        registry
            .submit_vote(VoteInput::new(room_id, guess, voter))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_stats_empty() {
        let registry = Registry::new();
        let stats = registry.get_stats().await;

        assert_eq!(stats, Stats::default());
        assert_eq!(stats.human_vs_ai.accuracy, 0.0);
        assert_eq!(stats.ai_vs_human.accuracy, 0.0);
    }

    #[tokio::test]
    async fn test_stats_rooms_without_votes() {
        let registry = Registry::new();
        registry.register_room("r1".to_string(), true).await;
        registry.register_room("r2".to_string(), false).await;

        assert_eq!(registry.get_stats().await, Stats::default());
    }

    #[tokio::test]
    async fn test_stats_single_ai_room_scenario() {
        let registry = Registry::new();
        registry.register_room("r1".to_string(), true).await;

        assert!(vote(&registry, "r1", Party::Ai, Party::Human).await);
        assert!(vote(&registry, "r1", Party::Human, Party::Ai).await);

        let stats = registry.get_stats().await;
        assert_eq!(
            stats.human_vs_ai,
            StratumStats {
                total: 1,
                correct: 1,
                accuracy: 1.0
            }
        );
        assert_eq!(
            stats.ai_vs_human,
            StratumStats {
                total: 1,
                correct: 1,
                accuracy: 1.0
            }
        );
        assert_eq!(
            stats.overall,
            OverallStats {
                total_votes: 2,
                correct_guesses: 2
            }
        );
    }

    #[tokio::test]
    async fn test_stats_partial_accuracy() {
        let registry = Registry::new();
        registry.register_room("r1".to_string(), true).await;

        vote(&registry, "r1", Party::Ai, Party::Human).await;
        vote(&registry, "r1", Party::Human, Party::Human).await;
        vote(&registry, "r1", Party::Human, Party::Human).await;
        vote(&registry, "r1", Party::Ai, Party::Human).await;

        let stats = registry.get_stats().await;
        assert_eq!(stats.human_vs_ai.total, 4);
        assert_eq!(stats.human_vs_ai.correct, 2);
        assert_eq!(stats.human_vs_ai.accuracy, 0.5);
        assert_eq!(stats.ai_vs_human, StratumStats::default());
    }

    #[tokio::test]
    async fn test_stats_human_rooms_only_count_overall() {
        let registry = Registry::new();
        registry.register_room("ai".to_string(), true).await;
        registry.register_room("people".to_string(), false).await;

        vote(&registry, "ai", Party::Ai, Party::Human).await;
        vote(&registry, "people", Party::Human, Party::Human).await;
        vote(&registry, "people", Party::Ai, Party::Human).await;
        vote(&registry, "people", Party::Human, Party::Ai).await;

        let stats = registry.get_stats().await;
        assert_eq!(stats.human_vs_ai.total, 1);
        assert_eq!(stats.ai_vs_human.total, 0);
        assert_eq!(stats.overall.total_votes, 4);
        assert_eq!(stats.overall.correct_guesses, 3);
        assert!(stats.human_vs_ai.total + stats.ai_vs_human.total < stats.overall.total_votes);
    }

    #[tokio::test]
    async fn test_stats_strata_cover_everything_when_all_rooms_are_ai() {
        let registry = Registry::new();
        registry.register_room("a".to_string(), true).await;
        registry.register_room("b".to_string(), true).await;

        vote(&registry, "a", Party::Ai, Party::Human).await;
        vote(&registry, "a", Party::Ai, Party::Ai).await;
        vote(&registry, "b", Party::Human, Party::Human).await;

        let stats = registry.get_stats().await;
        assert_eq!(
            stats.human_vs_ai.total + stats.ai_vs_human.total,
            stats.overall.total_votes
        );
        assert_eq!(stats.ai_vs_human.correct, 0);
        assert_eq!(stats.overall.correct_guesses, 1);
    }

    #[tokio::test]
    async fn test_reset_is_not_retroactive() {
        let registry = Registry::new();
        registry.register_room("r1".to_string(), true).await;
        vote(&registry, "r1", Party::Ai, Party::Human).await;

        let before = registry.get_stats().await;
        registry.register_room("r1".to_string(), true).await;
        let after = registry.get_stats().await;

        assert_eq!(before.overall.total_votes, 1);
        assert_eq!(before.human_vs_ai.total, 1);
        assert_eq!(after, Stats::default());
    }

    #[test]
    fn test_stats_wire_format() {
        let stats = Stats {
            overall: OverallStats {
                total_votes: 3,
                correct_guesses: 2,
            },
            ..Stats::default()
        };
        let json = serde_json::to_value(stats).unwrap();

        assert_eq!(json["overall"]["totalVotes"], 3);
        assert_eq!(json["overall"]["correctGuesses"], 2);
        assert_eq!(json["human_vs_ai"]["total"], 0);
        assert_eq!(json["ai_vs_human"]["accuracy"], 0.0);
    }
}

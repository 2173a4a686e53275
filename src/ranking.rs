use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct Standing {
    score: u32,
    /// Position of the player's first credit, used to break ties.
    first_credit: u64,
}

/// Process-wide daily scores, shared by every chat.
///
/// Each player key is updated under its own shard lock, so credits coming
/// from different chats never lose increments and never contend with any
/// chat's round lock.
#[derive(Debug, Default)]
pub struct RankingLedger {
    scores: DashMap<String, Standing>,
    credits: AtomicU64,
}

impl RankingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&self, player: &str, amount: u32) {
        if amount == 0 {
            return;
        }
        let mut standing = self
            .scores
            .entry(player.to_string())
            .or_insert_with(|| Standing {
                score: 0,
                first_credit: self.credits.fetch_add(1, Ordering::Relaxed),
            });
        standing.score += amount;
    }

    pub fn score(&self, player: &str) -> u32 {
        self.scores.get(player).map(|s| s.score).unwrap_or(0)
    }

    /// Scores sorted descending, ties in first-credited order.
    pub fn snapshot(&self) -> Vec<(String, u32)> {
        let mut standings: Vec<(String, Standing)> = self
            .scores
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        Self::sorted(&mut standings)
    }

    pub fn clear(&self) {
        self.scores.clear();
    }

    /// Removes every standing and returns what was removed, sorted like
    /// [`snapshot`](Self::snapshot). A credit racing with this call either
    /// lands in the returned table or in the next day's.
    pub fn close_day(&self) -> Vec<(String, u32)> {
        let players: Vec<String> = self.scores.iter().map(|entry| entry.key().clone()).collect();
        let mut standings: Vec<(String, Standing)> = players
            .into_iter()
            .filter_map(|player| self.scores.remove(&player))
            .collect();
        Self::sorted(&mut standings)
    }

    fn sorted(standings: &mut [(String, Standing)]) -> Vec<(String, u32)> {
        standings.sort_by(|(_, a), (_, b)| {
            b.score
                .cmp(&a.score)
                .then(a.first_credit.cmp(&b.first_credit))
        });
        standings
            .iter()
            .map(|(player, standing)| (player.clone(), standing.score))
            .collect()
    }
}

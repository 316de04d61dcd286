use game_types::RecordStatus;
use std::collections::HashMap;
use uuid::Uuid;

use crate::record::DailyRecord;

/// A player's aggregates over finished games, relative to every other player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStats {
    pub finished_games: u32,
    pub successes: u32,
    /// Percentage of finished games that were solved
    pub success_rate: f64,
    pub avg_attempts: f64,
    /// 1 = lowest average attempts. `None` without finished games.
    pub rank: Option<u32>,
    /// Number of players with at least one finished game
    pub ranked_players: u32,
    pub percentile: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct AttemptTotals {
    attempts: i64,
    games: u32,
}

impl AttemptTotals {
    fn mean(&self) -> f64 {
        self.attempts as f64 / self.games as f64
    }
}

pub struct StatsEngine;

impl StatsEngine {
    /// Compute `user_id`'s statistics. In-progress records in `records` are ignored.
    pub fn player_stats(records: &[DailyRecord], user_id: Uuid) -> PlayerStats {
        let finished: Vec<&DailyRecord> = records.iter().filter(|r| r.is_finished()).collect();

        let mine: Vec<&&DailyRecord> = finished.iter().filter(|r| r.user_id == user_id).collect();
        let finished_games = mine.len() as u32;
        let successes = mine
            .iter()
            .filter(|r| r.status == RecordStatus::Success)
            .count() as u32;

        let (success_rate, avg_attempts) = if finished_games > 0 {
            let total_attempts: i64 = mine.iter().map(|r| r.attempts as i64).sum();
            (
                successes as f64 / finished_games as f64 * 100.0,
                total_attempts as f64 / finished_games as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let averages = Self::average_attempts_by_user(&finished);
        let ranked_players = averages.len() as u32;
        let rank = Self::rank_of(&averages, user_id);
        let percentile = rank.map(|rank| (rank - 1) as f64 / ranked_players as f64 * 100.0);

        PlayerStats {
            finished_games,
            successes,
            success_rate,
            avg_attempts,
            rank,
            ranked_players,
            percentile,
        }
    }

    fn average_attempts_by_user(finished: &[&DailyRecord]) -> HashMap<Uuid, f64> {
        let mut totals: HashMap<Uuid, AttemptTotals> = HashMap::new();
        for record in finished {
            let entry = totals.entry(record.user_id).or_default();
            entry.attempts += record.attempts as i64;
            entry.games += 1;
        }

        totals
            .into_iter()
            .map(|(user_id, totals)| (user_id, totals.mean()))
            .collect()
    }

    /// Competition ranking by ascending average: players with equal averages share a rank.
    fn rank_of(averages: &HashMap<Uuid, f64>, user_id: Uuid) -> Option<u32> {
        let mine = *averages.get(&user_id)?;
        let better = averages.values().filter(|&&avg| avg < mine).count() as u32;
        Some(better + 1)
    }
}

/// Two decimal percentage, e.g. `"66.67%"`.
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

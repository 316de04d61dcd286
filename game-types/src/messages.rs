use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::GameRecord;

/// Body of `POST /game`. A missing `input` is reported as a validation error
/// rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameRequest {
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordStatsResponse {
    pub success_rate: String, // "66.67%"
    pub my_avg_attempts: f64,
    pub my_rank: Option<u32>,
    pub my_percentile: Option<String>,
    pub finished_games: u32,
    pub record_list: Vec<GameRecord>,
}

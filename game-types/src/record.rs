use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RecordStatus {
    InProgress, // Game of the day still running
    Success,    // Player found the word
    Failure,    // Player gave up
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::InProgress => "in_progress",
            RecordStatus::Success => "success",
            RecordStatus::Failure => "failure",
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, RecordStatus::InProgress)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRecordStatus(pub String);

impl fmt::Display for UnknownRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown record status '{}'", self.0)
    }
}

impl std::error::Error for UnknownRecordStatus {}

impl FromStr for RecordStatus {
    type Err = UnknownRecordStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "in_progress" => Ok(RecordStatus::InProgress),
            "success" => Ok(RecordStatus::Success),
            "failure" => Ok(RecordStatus::Failure),
            other => Err(UnknownRecordStatus(other.to_string())),
        }
    }
}

/// One entry of a player's record list as returned by `GET /record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameRecord {
    pub attempts: i32,
    pub result: RecordStatus,
    pub date: String, // YYYY-MM-DD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            RecordStatus::InProgress,
            RecordStatus::Success,
            RecordStatus::Failure,
        ] {
            assert_eq!(status.as_str().parse::<RecordStatus>(), Ok(status));
        }
        assert!("won".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn test_finished_statuses() {
        assert_eq!(RecordStatus::InProgress.to_string(), "in_progress");
        assert!(!RecordStatus::InProgress.is_finished());
        assert!(RecordStatus::Success.is_finished());
        assert!(RecordStatus::Failure.is_finished());
    }
}

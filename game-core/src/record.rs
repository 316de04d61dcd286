use chrono::NaiveDate;
use game_types::{GameRecord, RecordStatus};
use uuid::Uuid;

use crate::prompt::ReplyVerdict;

/// A player's game of one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub attempts: i32,
    pub status: RecordStatus,
    pub date: NaiveDate,
}

impl DailyRecord {
    /// The record created by the first move of the day
    pub fn start(user_id: Uuid, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            attempts: 1,
            status: RecordStatus::InProgress,
            date,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Count another move. Attempts are frozen once the game is finished.
    pub fn count_move(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// Finish the game if the verdict ends it. A status leaves `InProgress` at most once.
    pub fn apply_verdict(&mut self, verdict: ReplyVerdict) -> Option<RecordStatus> {
        if self.is_finished() {
            return None;
        }
        let status = verdict.final_status()?;
        self.status = status;
        Some(status)
    }

    pub fn to_game_record(&self) -> GameRecord {
        GameRecord {
            attempts: self.attempts,
            result: self.status,
            date: self.date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Result of applying one move to a day's record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub record: DailyRecord,
    /// No record existed for the day; `record` must be inserted.
    pub created: bool,
    /// An existing record changed and must be saved.
    pub changed: bool,
    /// Status the game finished with on this move.
    pub finished_as: Option<RecordStatus>,
}

/// Apply one move and its reply verdict to the record of `date`.
pub fn advance_record(
    existing: Option<DailyRecord>,
    user_id: Uuid,
    date: NaiveDate,
    verdict: ReplyVerdict,
) -> RecordUpdate {
    let (mut record, created, mut changed) = match existing {
        None => (DailyRecord::start(user_id, date), true, false),
        Some(mut record) => {
            let counted = record.count_move();
            (record, false, counted)
        }
    };

    let finished_as = record.apply_verdict(verdict);
    if finished_as.is_some() && !created {
        changed = true;
    }

    RecordUpdate {
        record,
        created,
        changed,
        finished_as,
    }
}

#![allow(dead_code)]

use chrono::NaiveDate;
use game_core::{DailyRecord, ReplyVerdict, WordList, advance_record};
use game_types::RecordStatus;
use uuid::Uuid;

pub const TEST_WORDS: [&str; 6] = ["사과", "기차", "고양이", "연필", "우산", "시계"];

/// Creates a word list with a known set of words
pub fn create_test_word_list() -> WordList {
    let word_list = "사과\n기차\n고양이\n연필\n# 주석\n\n우산\n시계";
    WordList::from_word_list(word_list)
}

pub fn test_date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, day).unwrap()
}

/// Plays a day's game move by move, feeding each verdict to the record state machine
pub fn play_day(user_id: Uuid, day: u32, verdicts: &[ReplyVerdict]) -> Option<DailyRecord> {
    let mut record = None;
    for verdict in verdicts {
        record = Some(advance_record(record, user_id, test_date(day), *verdict).record);
    }
    record
}

/// A finished game that took `moves` moves
pub fn finished_day(user_id: Uuid, day: u32, moves: usize, status: RecordStatus) -> DailyRecord {
    let last = match status {
        RecordStatus::Success => ReplyVerdict::Solved,
        RecordStatus::Failure => ReplyVerdict::GaveUp,
        RecordStatus::InProgress => ReplyVerdict::Continue,
    };
    let mut verdicts = vec![ReplyVerdict::Continue; moves.saturating_sub(1)];
    verdicts.push(last);
    play_day(user_id, day, &verdicts).unwrap()
}

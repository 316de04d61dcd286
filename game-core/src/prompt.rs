use game_types::RecordStatus;

/// Sentence the model must include when the player names the secret word.
pub const SOLVED_MARKER: &str = "정답입니다!";
/// Sentence the model must include when the player gives up.
pub const GAVE_UP_MARKER: &str = "포기하셨습니다.";

/// Build the system instruction for a new game around `secret_word`.
pub fn system_prompt(secret_word: &str) -> String {
    format!(
        "너는 나와 스무고개 게임을 할거야. 정답 단어는 {secret_word}야. \
         내 질문에는 정답을 직접 말하지 말고 예 또는 아니오로 짧게 대답해줘. \
         내가 포기하면 '{GAVE_UP_MARKER}' 라는 문장과 함께 정답을 알려줘. \
         정답을 맞히면 '{SOLVED_MARKER}' 와 함께 정답을 말해줘."
    )
}

/// What a model reply means for the game in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyVerdict {
    Solved,
    GaveUp,
    Continue,
}

impl ReplyVerdict {
    /// Classify a reply by its marker sentences. The solved marker wins if both appear.
    pub fn from_reply(reply: &str) -> Self {
        if reply.contains(SOLVED_MARKER) {
            ReplyVerdict::Solved
        } else if reply.contains(GAVE_UP_MARKER) {
            ReplyVerdict::GaveUp
        } else {
            ReplyVerdict::Continue
        }
    }

    pub fn ends_game(&self) -> bool {
        !matches!(self, ReplyVerdict::Continue)
    }

    /// Record status this verdict finishes a game with, if any
    pub fn final_status(&self) -> Option<RecordStatus> {
        match self {
            ReplyVerdict::Solved => Some(RecordStatus::Success),
            ReplyVerdict::GaveUp => Some(RecordStatus::Failure),
            ReplyVerdict::Continue => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_word_and_markers() {
        let prompt = system_prompt("고양이");
        assert!(prompt.contains("고양이"));
        assert!(prompt.contains(SOLVED_MARKER));
        assert!(prompt.contains(GAVE_UP_MARKER));
    }

    #[test]
    fn test_reply_classification() {
        assert_eq!(
            ReplyVerdict::from_reply("정답입니다! 정답은 고양이였어요."),
            ReplyVerdict::Solved
        );
        assert_eq!(
            ReplyVerdict::from_reply("포기하셨습니다. 정답은 고양이입니다."),
            ReplyVerdict::GaveUp
        );
        assert_eq!(ReplyVerdict::from_reply("아니요."), ReplyVerdict::Continue);
    }

    #[test]
    fn test_solved_marker_takes_precedence() {
        let reply = "포기하셨습니다. ...농담이에요, 정답입니다!";
        assert_eq!(ReplyVerdict::from_reply(reply), ReplyVerdict::Solved);
    }

    #[test]
    fn test_marker_must_match_exactly() {
        // Missing punctuation is not the marker
        assert_eq!(ReplyVerdict::from_reply("정답입니다"), ReplyVerdict::Continue);
        assert_eq!(ReplyVerdict::from_reply("포기하셨습니다"), ReplyVerdict::Continue);
    }

    #[test]
    fn test_final_status() {
        assert_eq!(ReplyVerdict::Solved.final_status(), Some(RecordStatus::Success));
        assert_eq!(ReplyVerdict::GaveUp.final_status(), Some(RecordStatus::Failure));
        assert_eq!(ReplyVerdict::Continue.final_status(), None);
        assert!(ReplyVerdict::Solved.ends_game());
        assert!(!ReplyVerdict::Continue.ends_game());
    }
}

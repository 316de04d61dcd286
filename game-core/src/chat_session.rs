use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::prompt::system_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Conversation state of one player's game: the hidden word and every turn so far.
#[derive(Debug)]
pub struct ChatSession {
    pub id: Uuid,
    secret_word: String,
    system_prompt: String,
    history: Vec<ChatTurn>,
    created_at: Instant,
    last_activity: Instant,
    retired: bool,
}

impl ChatSession {
    pub fn new(secret_word: String) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            system_prompt: system_prompt(&secret_word),
            secret_word,
            history: Vec::new(),
            created_at: now,
            last_activity: now,
            retired: false,
        }
    }

    pub fn secret_word(&self) -> &str {
        &self.secret_word
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Number of completed question/answer exchanges
    pub fn questions_asked(&self) -> usize {
        self.history
            .iter()
            .filter(|turn| turn.role == ChatRole::User)
            .count()
    }

    /// Append one exchange. Only called once the provider has answered, so a failed
    /// call leaves the history untouched.
    pub fn record_exchange(&mut self, input: String, reply: String) {
        self.history.push(ChatTurn {
            role: ChatRole::User,
            text: input,
        });
        self.history.push(ChatTurn {
            role: ChatRole::Model,
            text: reply,
        });
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.idle_for() > timeout
    }

    /// Mark the game over. A retired session accepts no further turns.
    pub fn retire(&mut self) {
        self.retired = true;
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

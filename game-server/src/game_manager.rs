use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::{ChatError, ChatProvider};
use crate::rate_limiter::RateLimiter;
use game_core::{ChatSession, RecordUpdate, ReplyVerdict, WordList};
use game_persistence::repositories::RecordRepository;

pub const MAX_INPUT_CHARS: usize = 100;

/// Identity a chat session is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerKey {
    User(Uuid),
    Guest(Uuid),
}

impl PlayerKey {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            PlayerKey::User(id) => Some(*id),
            PlayerKey::Guest(_) => None,
        }
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerKey::User(id) => write!(f, "user:{}", id),
            PlayerKey::Guest(id) => write!(f, "guest:{}", id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Request Body must include 'input'")]
    MissingInput,
    #[error("Input must be less than 100 characters")]
    InputTooLong,
    #[error("Too many requests")]
    RateLimited,
    #[error("Chat provider error: {0}")]
    Provider(#[from] ChatError),
    #[error("No words available")]
    NoWords,
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Check a raw `input` field before it reaches the chat provider.
pub fn validate_input(input: Option<&str>) -> Result<&str, TurnError> {
    let input = input.filter(|s| !s.is_empty()).ok_or(TurnError::MissingInput)?;
    if input.chars().count() > MAX_INPUT_CHARS {
        return Err(TurnError::InputTooLong);
    }
    Ok(input)
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub verdict: ReplyVerdict,
    pub session_id: Uuid,
    /// The turn opened a new game
    pub new_session: bool,
    pub questions_asked: usize,
    /// Today's record after the move, for signed-in players
    pub record: Option<RecordUpdate>,
}

/// Registry of running games, one chat session per player.
pub struct GameManager {
    sessions: DashMap<PlayerKey, Arc<Mutex<ChatSession>>>,
    rate_limits: DashMap<PlayerKey, RateLimiter>,
    address_limits: DashMap<IpAddr, RateLimiter>,
    word_list: Arc<WordList>,
    provider: Arc<dyn ChatProvider>,
    records: Arc<RecordRepository>,
    rate_limit_tokens: u32,
    rate_limit_refill: Duration,
}

impl GameManager {
    pub fn new(
        word_list: Arc<WordList>,
        provider: Arc<dyn ChatProvider>,
        records: Arc<RecordRepository>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            rate_limits: DashMap::new(),
            address_limits: DashMap::new(),
            word_list,
            provider,
            records,
            rate_limit_tokens: 30,
            rate_limit_refill: Duration::from_secs(2),
        }
    }

    pub fn with_rate_limit(mut self, max_tokens: u32, refill_rate: Duration) -> Self {
        self.rate_limit_tokens = max_tokens;
        self.rate_limit_refill = refill_rate;
        self
    }

    fn check_rate_limit(&self, player: PlayerKey) -> bool {
        self.rate_limits
            .entry(player)
            .or_insert_with(|| {
                RateLimiter::new_with_limits(self.rate_limit_tokens, self.rate_limit_refill)
            })
            .try_acquire()
    }

    /// The player's running session, or a new one with a fresh secret word.
    fn session_for(&self, player: PlayerKey) -> Result<(Arc<Mutex<ChatSession>>, bool), TurnError> {
        if let Some(session) = self.sessions.get(&player) {
            return Ok((session.clone(), false));
        }

        let secret_word = self.word_list.random_word().map_err(|_| TurnError::NoWords)?;
        match self.sessions.entry(player) {
            Entry::Occupied(entry) => Ok((entry.get().clone(), false)),
            Entry::Vacant(entry) => {
                let session = ChatSession::new(secret_word);
                info!("Started game session {} for {}", session.id, player);
                let session = Arc::new(Mutex::new(session));
                entry.insert(session.clone());
                Ok((session, true))
            }
        }
    }

    /// Lock the player's live session. A session retired while this turn waited
    /// for the lock is skipped and the player starts over with a new game.
    async fn lock_live_session(
        &self,
        player: PlayerKey,
    ) -> Result<(Arc<Mutex<ChatSession>>, OwnedMutexGuard<ChatSession>, bool), TurnError> {
        loop {
            let (session, new_session) = self.session_for(player)?;
            let guard = session.clone().lock_owned().await;
            if !guard.is_retired() {
                return Ok((session, guard, new_session));
            }
            debug!("Session {} of {} ended while waiting, starting over", guard.id, player);
        }
    }

    /// Play one move: ask the chat provider, update today's record and end the
    /// game when the reply says so.
    pub async fn play_turn(&self, player: PlayerKey, input: &str) -> Result<TurnOutcome, TurnError> {
        if !self.check_rate_limit(player) {
            warn!("Rate limit exceeded for {}", player);
            return Err(TurnError::RateLimited);
        }

        let (session, mut guard, new_session) = self.lock_live_session(player).await?;

        let reply = match self
            .provider
            .send(guard.system_prompt(), guard.history(), input)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                warn!("Chat provider failed for {}: {}", player, err);
                return Err(err.into());
            }
        };
        guard.record_exchange(input.to_string(), reply.clone());

        let verdict = ReplyVerdict::from_reply(&reply);
        let session_id = guard.id;
        let questions_asked = guard.questions_asked();
        debug!(
            "{} asked question {} in session {}: {:?}",
            player, questions_asked, session_id, verdict
        );

        // Retirement and the record update both happen under the session lock
        if verdict.ends_game() {
            guard.retire();
        }
        let record = match player.user_id() {
            Some(user_id) => Some(
                self.records
                    .record_move(user_id, Utc::now().date_naive(), verdict)
                    .await,
            ),
            None => None,
        };
        if guard.is_retired() {
            self.retire_session(player, &session);
        }
        drop(guard);

        let record = record
            .transpose()
            .map_err(|e| TurnError::Storage(format!("{:#}", e)))?;

        Ok(TurnOutcome {
            reply,
            verdict,
            session_id,
            new_session,
            questions_asked,
            record,
        })
    }

    /// Admit a guest arriving without a player cookie. Such guests share one
    /// bucket per remote address.
    pub fn admit_new_guest(&self, addr: IpAddr) -> bool {
        let admitted = self
            .address_limits
            .entry(addr)
            .or_insert_with(|| {
                RateLimiter::new_with_limits(self.rate_limit_tokens, self.rate_limit_refill)
            })
            .try_acquire();
        if !admitted {
            warn!("Rate limit exceeded for new guests from {}", addr);
        }
        admitted
    }

    /// Remove `session` from the registry unless it was already replaced.
    pub fn retire_session(&self, player: PlayerKey, session: &Arc<Mutex<ChatSession>>) -> bool {
        let removed = self
            .sessions
            .remove_if(&player, |_, current| Arc::ptr_eq(current, session))
            .is_some();
        if removed {
            info!("Retired game session of {}", player);
        }
        removed
    }

    /// Retire sessions idle for longer than `timeout`. Sessions mid-turn are skipped.
    pub fn cleanup_idle_sessions(&self, timeout: Duration) -> usize {
        let mut retired = 0;
        self.sessions.retain(|player, session| match session.try_lock() {
            Ok(mut session) if session.is_idle(timeout) => {
                session.retire();
                info!(
                    "Removed idle game session {} of {} after {:?}",
                    session.id,
                    player,
                    session.age()
                );
                retired += 1;
                false
            }
            _ => true,
        });

        self.rate_limits
            .retain(|player, limiter| self.sessions.contains_key(player) || !limiter.is_full());
        self.address_limits.retain(|_, limiter| !limiter.is_full());

        retired
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, player: PlayerKey) -> bool {
        self.sessions.contains_key(&player)
    }

    pub async fn secret_word(&self, player: PlayerKey) -> Option<String> {
        let session = self.sessions.get(&player)?.clone();
        let guard = session.lock().await;
        Some(guard.secret_word().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use game_core::ChatTurn;
    use game_persistence::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};

    struct FixedReply(&'static str);

    #[async_trait]
    impl ChatProvider for FixedReply {
        async fn send(&self, _: &str, _: &[ChatTurn], _: &str) -> Result<String, ChatError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl ChatProvider for Failing {
        async fn send(&self, _: &str, _: &[ChatTurn], _: &str) -> Result<String, ChatError> {
            Err(ChatError::EmptyReply)
        }
    }

    async fn manager(provider: Arc<dyn ChatProvider>) -> GameManager {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        GameManager::new(
            Arc::new(WordList::from_word_list("사과\n바나나\n")),
            provider,
            Arc::new(RecordRepository::new(db)),
        )
    }

    #[test]
    fn test_validate_input() {
        assert!(matches!(validate_input(None), Err(TurnError::MissingInput)));
        assert!(matches!(validate_input(Some("")), Err(TurnError::MissingInput)));
        assert_eq!(validate_input(Some("동물인가요?")).unwrap(), "동물인가요?");

        let hundred = "가".repeat(100);
        assert!(validate_input(Some(&hundred)).is_ok());
        let too_long = "가".repeat(101);
        assert!(matches!(validate_input(Some(&too_long)), Err(TurnError::InputTooLong)));
    }

    #[tokio::test]
    async fn test_guest_turn_keeps_session() {
        let manager = manager(Arc::new(FixedReply("아니요."))).await;
        let guest = PlayerKey::Guest(Uuid::new_v4());

        let first = manager.play_turn(guest, "동물인가요?").await.unwrap();
        assert!(first.new_session);
        assert!(first.record.is_none());
        assert_eq!(first.reply, "아니요.");

        let second = manager.play_turn(guest, "과일인가요?").await.unwrap();
        assert!(!second.new_session);
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.questions_asked, 2);
        assert!(manager.has_session(guest));
    }

    #[tokio::test]
    async fn test_marker_reply_retires_session() {
        let manager = manager(Arc::new(FixedReply("정답입니다! 정답은 사과입니다."))).await;
        let guest = PlayerKey::Guest(Uuid::new_v4());

        let outcome = manager.play_turn(guest, "사과").await.unwrap();
        assert_eq!(outcome.verdict, ReplyVerdict::Solved);
        assert!(!manager.has_session(guest));
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_history() {
        let manager = manager(Arc::new(Failing)).await;
        let guest = PlayerKey::Guest(Uuid::new_v4());

        let result = manager.play_turn(guest, "동물인가요?").await;
        assert!(matches!(result, Err(TurnError::Provider(_))));

        let session = manager.sessions.get(&guest).unwrap().clone();
        assert!(session.lock().await.history().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let manager = manager(Arc::new(FixedReply("아니요.")))
            .await
            .with_rate_limit(2, Duration::from_secs(60));
        let guest = PlayerKey::Guest(Uuid::new_v4());

        assert!(manager.play_turn(guest, "하나").await.is_ok());
        assert!(manager.play_turn(guest, "둘").await.is_ok());
        assert!(matches!(
            manager.play_turn(guest, "셋").await,
            Err(TurnError::RateLimited)
        ));

        let other = PlayerKey::Guest(Uuid::new_v4());
        assert!(manager.play_turn(other, "하나").await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_idle_sessions() {
        let manager = manager(Arc::new(FixedReply("아니요."))).await;
        let guest = PlayerKey::Guest(Uuid::new_v4());
        manager.play_turn(guest, "동물인가요?").await.unwrap();

        assert_eq!(manager.cleanup_idle_sessions(Duration::from_secs(3600)), 0);
        assert!(manager.has_session(guest));

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(manager.cleanup_idle_sessions(Duration::ZERO), 1);
        assert!(!manager.has_session(guest));
    }

    #[tokio::test]
    async fn test_retire_ignores_replaced_session() {
        let manager = manager(Arc::new(FixedReply("아니요."))).await;
        let guest = PlayerKey::Guest(Uuid::new_v4());
        manager.play_turn(guest, "동물인가요?").await.unwrap();

        let stale = Arc::new(Mutex::new(ChatSession::new("바나나".to_string())));
        assert!(!manager.retire_session(guest, &stale));
        assert!(manager.has_session(guest));
    }

    #[tokio::test]
    async fn test_turn_waiting_on_ended_game_starts_new_one() {
        let manager = Arc::new(manager(Arc::new(FixedReply("아니요."))).await);
        let guest = PlayerKey::Guest(Uuid::new_v4());
        let first = manager.play_turn(guest, "동물인가요?").await.unwrap();

        let session = manager.sessions.get(&guest).unwrap().clone();
        let mut guard = session.lock().await;

        let waiting = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.play_turn(guest, "과일인가요?").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        guard.retire();
        assert!(manager.retire_session(guest, &session));
        drop(guard);

        let second = waiting.await.unwrap().unwrap();
        assert!(second.new_session);
        assert_ne!(second.session_id, first.session_id);
        assert_eq!(second.questions_asked, 1);
        assert_eq!(session.lock().await.questions_asked(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_drops_unused_rate_limits() {
        let manager = manager(Arc::new(FixedReply("아니요."))).await;
        let live = PlayerKey::Guest(Uuid::new_v4());
        manager.play_turn(live, "동물인가요?").await.unwrap();

        let retired = PlayerKey::Guest(Uuid::new_v4());
        manager
            .rate_limits
            .insert(retired, RateLimiter::new_with_limits(30, Duration::from_secs(60)));

        let drained = PlayerKey::Guest(Uuid::new_v4());
        let mut limiter = RateLimiter::new_with_limits(30, Duration::from_secs(60));
        assert!(limiter.try_acquire());
        manager.rate_limits.insert(drained, limiter);

        manager.cleanup_idle_sessions(Duration::from_secs(3600));

        assert!(manager.rate_limits.contains_key(&live));
        assert!(!manager.rate_limits.contains_key(&retired));
        assert!(manager.rate_limits.contains_key(&drained));
    }

    #[tokio::test]
    async fn test_new_guests_limited_per_address() {
        let manager = manager(Arc::new(FixedReply("아니요.")))
            .await
            .with_rate_limit(2, Duration::from_secs(60));
        let addr: IpAddr = "203.0.113.7".parse().unwrap();

        assert!(manager.admit_new_guest(addr));
        assert!(manager.admit_new_guest(addr));
        assert!(!manager.admit_new_guest(addr));
        assert!(manager.admit_new_guest("203.0.113.8".parse().unwrap()));

        // A drained address bucket survives the sweep
        manager.cleanup_idle_sessions(Duration::from_secs(3600));
        assert!(!manager.admit_new_guest(addr));
    }
}

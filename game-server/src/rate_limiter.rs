use std::time::{Duration, Instant};

/// Token bucket: `max_tokens` burst, one token back every `refill_rate`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tokens: f64,
    max_tokens: u32,
    refill_rate: Duration,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::new_with_limits(30, Duration::from_secs(2))
    }

    pub fn new_with_limits(max_tokens: u32, refill_rate: Duration) -> Self {
        Self {
            tokens: max_tokens as f64,
            max_tokens,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&mut self) -> bool {
        self.refill_tokens();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill_tokens(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        self.last_refill = now;

        if self.refill_rate.is_zero() {
            self.tokens = self.max_tokens as f64;
            return;
        }

        let earned = elapsed.as_secs_f64() / self.refill_rate.as_secs_f64();
        self.tokens = (self.tokens + earned).min(self.max_tokens as f64);
    }

    pub fn remaining_tokens(&mut self) -> u32 {
        self.refill_tokens();
        self.tokens.floor() as u32
    }

    /// A full bucket carries no state worth keeping.
    pub fn is_full(&mut self) -> bool {
        self.remaining_tokens() >= self.max_tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

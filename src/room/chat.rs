//! §4.6 ChatManager: text/quick-chat/reaction handling with per-user rate
//! limits. Grounded in `rate_limit.rs`'s windowed `RateLimitEntry` pattern,
//! generalized from one limited category (room joins) to four.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::protocol::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitCategory {
    Chat,
    Reaction,
    TypingStart,
}

impl RateLimitCategory {
    fn window_millis(self) -> i64 {
        match self {
            Self::Chat => 1_000,
            Self::Reaction => 1_000,
            Self::TypingStart => 2_000,
        }
    }

    fn max_per_window(self) -> u32 {
        match self {
            Self::Chat => 1,
            Self::Reaction => 5,
            Self::TypingStart => 1,
        }
    }
}

#[derive(Debug, Default)]
struct Window {
    window_started_at: Option<DateTime<Utc>>,
    count: u32,
}

/// Non-authoritative between events, per §5's suspension-point rule: only
/// the last-N persisted chat history matters after eviction, not these
/// in-memory counters.
#[derive(Default)]
pub struct ChatRateLimiter {
    windows: HashMap<(UserId, RateLimitCategory), Window>,
    typing_started_at: HashMap<UserId, DateTime<Utc>>,
}

impl ChatRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the event is allowed and records it; `false` if the
    /// caller should be rejected with `RATE_LIMITED`. System messages bypass
    /// this entirely and should never call through here.
    pub fn check(&mut self, user_id: UserId, category: RateLimitCategory, now: DateTime<Utc>) -> bool {
        let window = self.windows.entry((user_id, category)).or_default();
        let window_elapsed = window
            .window_started_at
            .is_none_or(|started| (now - started).num_milliseconds() >= category.window_millis());

        if window_elapsed {
            window.window_started_at = Some(now);
            window.count = 1;
            return true;
        }

        if window.count < category.max_per_window() {
            window.count += 1;
            true
        } else {
            false
        }
    }

    /// `typing.start` rearms a 3s auto-clear; `typing.stop` or expiry both
    /// clear it. Returns whether the typing indicator is currently active.
    pub fn mark_typing_started(&mut self, user_id: UserId, now: DateTime<Utc>) {
        self.typing_started_at.insert(user_id, now);
    }

    pub fn clear_typing(&mut self, user_id: &UserId) {
        self.typing_started_at.remove(user_id);
    }

    pub fn is_typing(&self, user_id: &UserId, now: DateTime<Utc>) -> bool {
        self.typing_started_at
            .get(user_id)
            .is_some_and(|started| (now - *started).num_seconds() < 3)
    }

    /// Drops counters for a user who has left the room.
    pub fn remove_user(&mut self, user_id: &UserId) {
        self.windows.retain(|(id, _), _| id != user_id);
        self.typing_started_at.remove(user_id);
    }
}

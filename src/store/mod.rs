//! Persisted storage abstraction. One key per logical entity (§6): `room`,
//! `game`, `seats:<userId>`, `chat_history`, `alarm_data`, `rng_state`. The
//! actor owns storage exclusively; external code never reads or writes it
//! directly (§5).

pub mod memory;

use async_trait::async_trait;

use crate::protocol::{AlarmData, ChatMessage, GameState, RoomState, Seat, UserId};

pub use memory::InMemoryRoomStore;

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn load_room(&self) -> anyhow::Result<Option<RoomState>>;
    async fn save_room(&self, room: &RoomState) -> anyhow::Result<()>;

    async fn load_seats(&self) -> anyhow::Result<Vec<Seat>>;
    async fn save_seat(&self, seat: &Seat) -> anyhow::Result<()>;
    async fn delete_seat(&self, user_id: &UserId) -> anyhow::Result<()>;

    async fn load_game(&self) -> anyhow::Result<Option<GameState>>;
    async fn save_game(&self, game: &GameState) -> anyhow::Result<()>;

    async fn load_chat_history(&self) -> anyhow::Result<Vec<ChatMessage>>;
    async fn append_chat_message(&self, message: ChatMessage, limit: usize) -> anyhow::Result<()>;

    async fn load_alarm_data(&self) -> anyhow::Result<AlarmData>;
    async fn save_alarm_data(&self, data: &AlarmData) -> anyhow::Result<()>;

    async fn load_rng_state(&self) -> anyhow::Result<Option<[u8; 16]>>;
    async fn save_rng_state(&self, state: [u8; 16]) -> anyhow::Result<()>;
}

/// Only one concrete backend exists today, same as the teacher's
/// `DatabaseConfig`. The enum exists so a second backend is a config change,
/// not an API break.
pub enum RoomStoreConfig {
    InMemory,
}

pub fn create_room_store(config: &RoomStoreConfig) -> std::sync::Arc<dyn RoomStore> {
    match config {
        RoomStoreConfig::InMemory => std::sync::Arc::new(InMemoryRoomStore::new()),
    }
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::RoomStore;
use crate::protocol::{AlarmData, ChatMessage, GameState, RoomState, Seat, UserId};

/// In-memory backend. Values round-trip through `serde_json` internally even
/// though they never leave the process, to keep the "all values are JSON"
/// contract in §6 honest for whichever real backend replaces this one.
#[derive(Default)]
pub struct InMemoryRoomStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    room: Option<String>,
    seats: HashMap<UserId, String>,
    game: Option<String>,
    chat_history: Vec<String>,
    alarm_data: Option<String>,
    rng_state: Option<[u8; 16]>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn load_room(&self) -> anyhow::Result<Option<RoomState>> {
        let inner = self.inner.lock().unwrap();
        Ok(match &inner.room {
            Some(raw) => Some(serde_json::from_str(raw)?),
            None => None,
        })
    }

    async fn save_room(&self, room: &RoomState) -> anyhow::Result<()> {
        let raw = serde_json::to_string(room)?;
        self.inner.lock().unwrap().room = Some(raw);
        Ok(())
    }

    async fn load_seats(&self) -> anyhow::Result<Vec<Seat>> {
        let inner = self.inner.lock().unwrap();
        inner
            .seats
            .values()
            .map(|raw| serde_json::from_str(raw).map_err(anyhow::Error::from))
            .collect()
    }

    async fn save_seat(&self, seat: &Seat) -> anyhow::Result<()> {
        let raw = serde_json::to_string(seat)?;
        self.inner.lock().unwrap().seats.insert(seat.user_id, raw);
        Ok(())
    }

    async fn delete_seat(&self, user_id: &UserId) -> anyhow::Result<()> {
        self.inner.lock().unwrap().seats.remove(user_id);
        Ok(())
    }

    async fn load_game(&self) -> anyhow::Result<Option<GameState>> {
        let inner = self.inner.lock().unwrap();
        Ok(match &inner.game {
            Some(raw) => Some(serde_json::from_str(raw)?),
            None => None,
        })
    }

    async fn save_game(&self, game: &GameState) -> anyhow::Result<()> {
        let raw = serde_json::to_string(game)?;
        self.inner.lock().unwrap().game = Some(raw);
        Ok(())
    }

    async fn load_chat_history(&self) -> anyhow::Result<Vec<ChatMessage>> {
        let inner = self.inner.lock().unwrap();
        inner
            .chat_history
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(anyhow::Error::from))
            .collect()
    }

    async fn append_chat_message(&self, message: ChatMessage, limit: usize) -> anyhow::Result<()> {
        let raw = serde_json::to_string(&message)?;
        let mut inner = self.inner.lock().unwrap();
        inner.chat_history.push(raw);
        let len = inner.chat_history.len();
        if len > limit {
            inner.chat_history.drain(0..len - limit);
        }
        Ok(())
    }

    async fn load_alarm_data(&self) -> anyhow::Result<AlarmData> {
        let inner = self.inner.lock().unwrap();
        Ok(match &inner.alarm_data {
            Some(raw) => serde_json::from_str(raw)?,
            None => AlarmData::default(),
        })
    }

    async fn save_alarm_data(&self, data: &AlarmData) -> anyhow::Result<()> {
        let raw = serde_json::to_string(data)?;
        self.inner.lock().unwrap().alarm_data = Some(raw);
        Ok(())
    }

    async fn load_rng_state(&self) -> anyhow::Result<Option<[u8; 16]>> {
        Ok(self.inner.lock().unwrap().rng_state)
    }

    async fn save_rng_state(&self, state: [u8; 16]) -> anyhow::Result<()> {
        self.inner.lock().unwrap().rng_state = Some(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RoomSettings;

    #[tokio::test]
    async fn round_trips_room_state() {
        let store = InMemoryRoomStore::new();
        let room = RoomState::new("ABC234".to_string(), UserId::new_v4(), RoomSettings::default());
        store.save_room(&room).await.unwrap();
        let loaded = store.load_room().await.unwrap().unwrap();
        assert_eq!(loaded.room_code, "ABC234");
    }

    #[tokio::test]
    async fn chat_history_is_trimmed_to_limit() {
        let store = InMemoryRoomStore::new();
        for i in 0..25 {
            let message = ChatMessage {
                id: i.to_string(),
                message_type: crate::protocol::ChatMessageType::Text,
                user_id: UserId::new_v4(),
                display_name: "p".to_string(),
                content: "hi".to_string(),
                timestamp: chrono::Utc::now(),
                reactions: HashMap::new(),
            };
            store.append_chat_message(message, 20).await.unwrap();
        }
        let history = store.load_chat_history().await.unwrap();
        assert_eq!(history.len(), 20);
        assert_eq!(history.first().unwrap().id, "5");
    }
}

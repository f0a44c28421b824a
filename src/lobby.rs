//! The lobby directory actor is an external collaborator (§1); this crate
//! only publishes to it via the `LobbyDirectory` trait (§6's
//! `LobbyDirectory.updateRoomStatus`, fire-and-forget).

use async_trait::async_trait;
use std::sync::Mutex;

use crate::protocol::RoomStatusUpdate;

#[async_trait]
pub trait LobbyDirectory: Send + Sync {
    /// Best-effort publish. Failures are logged by the caller and swallowed
    /// (§4.7): they must never block game progress.
    async fn update_room_status(&self, update: RoomStatusUpdate) -> anyhow::Result<()>;
}

/// Records every publish for tests; also useful as a local no-op directory
/// during development when no real lobby service is wired up.
#[derive(Default)]
pub struct InMemoryLobbyDirectory {
    published: Mutex<Vec<RoomStatusUpdate>>,
}

impl InMemoryLobbyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_update(&self) -> Option<RoomStatusUpdate> {
        self.published.lock().unwrap().last().cloned()
    }

    pub fn updates_for(&self, room_code: &str) -> Vec<RoomStatusUpdate> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|update| update.room_code == room_code)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LobbyDirectory for InMemoryLobbyDirectory {
    async fn update_room_status(&self, update: RoomStatusUpdate) -> anyhow::Result<()> {
        self.published.lock().unwrap().push(update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ProjectedStatus, RoomStatusUpdate};

    fn sample_update(room_code: &str) -> RoomStatusUpdate {
        RoomStatusUpdate {
            room_code: room_code.to_string(),
            status: ProjectedStatus::Waiting,
            player_count: 1,
            spectator_count: 0,
            max_players: 4,
            round_number: 0,
            total_rounds: 13,
            is_public: true,
            allow_spectators: true,
            players: Vec::new(),
            host_id: uuid::Uuid::new_v4(),
            host_name: "Host".to_string(),
            paused_at: None,
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_every_publish() {
        let directory = InMemoryLobbyDirectory::new();
        directory.update_room_status(sample_update("ABC234")).await.unwrap();
        directory.update_room_status(sample_update("ABC234")).await.unwrap();
        assert_eq!(directory.updates_for("ABC234").len(), 2);
    }
}

//! Process-wide directory of live rooms (§6: "a room code always resolves
//! to the same actor instance"). Grounded in the teacher's client/room
//! registries (`DashMap`-backed lookup tables in `server/mod.rs`), narrowed
//! from "many registries for many concerns" to the one this crate needs.

use std::sync::Arc;

use dashmap::DashMap;

use crate::identity::VerifiedIdentity;
use crate::lobby::LobbyDirectory;
use crate::metrics::Metrics;
use crate::protocol::{RoomSettings, RoomCode};
use crate::room::GameRoom;
use crate::store::RoomStoreConfig;

/// Owns every live [`GameRoom`] for this process. A room is created lazily
/// on first join and hydrated from storage if it was previously evicted
/// (not implemented here: eviction itself, since storage is in-memory for
/// this process and a room therefore never outlives it).
pub struct RoomDirectory {
    rooms: DashMap<RoomCode, Arc<GameRoom>>,
    store_config: RoomStoreConfig,
    lobby: Arc<dyn LobbyDirectory>,
    metrics: Arc<Metrics>,
}

impl RoomDirectory {
    pub fn new(store_config: RoomStoreConfig, lobby: Arc<dyn LobbyDirectory>, metrics: Arc<Metrics>) -> Self {
        Self {
            rooms: DashMap::new(),
            store_config,
            lobby,
            metrics,
        }
    }

    pub fn get(&self, room_code: &str) -> Option<Arc<GameRoom>> {
        self.rooms.get(room_code).map(|entry| entry.clone())
    }

    /// Creates a brand-new room with `host` as the first seat. Fails if a
    /// room with this code is already live.
    pub async fn create(
        &self,
        room_code: RoomCode,
        host: &VerifiedIdentity,
        settings: RoomSettings,
    ) -> anyhow::Result<Arc<GameRoom>> {
        if self.rooms.contains_key(&room_code) {
            anyhow::bail!("room {room_code} already exists");
        }
        let store = crate::store::create_room_store(&self.store_config);
        let room = Arc::new(
            GameRoom::create(room_code.clone(), host, settings, store, self.lobby.clone(), self.metrics.clone())
                .await?,
        );
        self.rooms.insert(room_code, room.clone());
        Ok(room)
    }

    /// Every room this process currently holds live, for the alarm sweep
    /// (§4.5) to drive without a separate registry of deadlines.
    pub fn all(&self) -> Vec<Arc<GameRoom>> {
        self.rooms.iter().map(|entry| entry.clone()).collect()
    }

    pub fn remove(&self, room_code: &str) {
        self.rooms.remove(room_code);
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::InMemoryLobbyDirectory;
    use crate::protocol::UserId;

    fn host_identity() -> VerifiedIdentity {
        VerifiedIdentity {
            user_id: UserId::new_v4(),
            display_name: "Host".into(),
            avatar_seed: "x".into(),
        }
    }

    #[tokio::test]
    async fn same_room_code_always_resolves_to_the_same_instance() {
        let directory = RoomDirectory::new(
            RoomStoreConfig::InMemory,
            Arc::new(InMemoryLobbyDirectory::new()),
            Arc::new(Metrics::new()),
        );
        let created = directory
            .create("ABC234".into(), &host_identity(), RoomSettings::default())
            .await
            .unwrap();
        let looked_up = directory.get("ABC234").unwrap();
        assert_eq!(created.room_code(), looked_up.room_code());
    }

    #[tokio::test]
    async fn creating_a_duplicate_room_code_fails() {
        let directory = RoomDirectory::new(
            RoomStoreConfig::InMemory,
            Arc::new(InMemoryLobbyDirectory::new()),
            Arc::new(Metrics::new()),
        );
        directory
            .create("ABC234".into(), &host_identity(), RoomSettings::default())
            .await
            .unwrap();
        let result = directory
            .create("ABC234".into(), &host_identity(), RoomSettings::default())
            .await;
        assert!(result.is_err());
    }
}

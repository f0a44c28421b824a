//! §4.7 LobbyProjector: builds the room's broadcast-ready view of itself
//! from persisted Seats and GameState, never from the live socket set, so a
//! disconnected-but-reclaimable player still renders with a "Rejoin"
//! affordance instead of "Join". Grounded in the teacher's dashboard-cache
//! shape: build-from-state, publish, swallow failures.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::lobby::LobbyDirectory;
use crate::metrics::Metrics;
use crate::protocol::{
    GameState, ProjectedPlayer, ProjectedStatus, RoomState, RoomStatus, RoomStatusUpdate, Seat,
    UserId,
};

pub struct LobbyProjector;

impl LobbyProjector {
    pub fn build(
        room: &RoomState,
        seats: &HashMap<UserId, Seat>,
        game: &GameState,
        spectator_count: usize,
        last_seen: &HashMap<UserId, DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> RoomStatusUpdate {
        let players: Vec<ProjectedPlayer> = seats
            .values()
            .map(|seat| ProjectedPlayer {
                user_id: seat.user_id,
                display_name: seat.display_name.clone(),
                avatar_seed: seat.avatar_seed.clone(),
                score: game
                    .players
                    .get(&seat.user_id)
                    .map(|p| p.scorecard.total_score())
                    .unwrap_or(0),
                is_host: seat.is_host,
                presence_state: seat.presence(now),
                reconnect_deadline: seat.reconnect_deadline,
                last_seen_at: last_seen.get(&seat.user_id).copied(),
            })
            .collect();

        // I7: playerCount excludes abandoned seats.
        let player_count = players
            .iter()
            .filter(|p| {
                !matches!(p.presence_state, crate::protocol::PresenceState::Abandoned)
            })
            .count();

        let host = seats.values().find(|seat| seat.is_host);

        RoomStatusUpdate {
            room_code: room.room_code.clone(),
            status: project_status(room.status),
            player_count,
            spectator_count,
            max_players: room.settings.max_players,
            round_number: game.round_number,
            total_rounds: 13,
            is_public: room.settings.is_public,
            allow_spectators: room.settings.allow_spectators,
            players,
            host_id: host.map(|s| s.user_id).unwrap_or(room.host_user_id),
            host_name: host.map(|s| s.display_name.clone()).unwrap_or_default(),
            paused_at: room.paused_at,
            updated_at: now,
        }
    }

    /// Publishes to the external lobby directory. Failures are logged and
    /// swallowed (§4.7): never block game progress.
    pub async fn publish(
        directory: &Arc<dyn LobbyDirectory>,
        metrics: &Metrics,
        update: RoomStatusUpdate,
    ) {
        let room_code = update.room_code.clone();
        if let Err(error) = directory.update_room_status(update).await {
            metrics.increment_lobby_publish_failures();
            tracing::warn!(%room_code, %error, "lobby status publish failed; will retry on next material change");
        }
    }
}

fn project_status(status: RoomStatus) -> ProjectedStatus {
    match status {
        RoomStatus::Waiting | RoomStatus::Starting => ProjectedStatus::Waiting,
        RoomStatus::Playing => ProjectedStatus::Playing,
        RoomStatus::Paused => ProjectedStatus::Paused,
        RoomStatus::Completed | RoomStatus::Abandoned => ProjectedStatus::Finished,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RoomSettings;

    #[test]
    fn abandoned_seats_are_excluded_from_player_count() {
        let host_id = UserId::new_v4();
        let mut room = RoomState::new("ABC234".into(), host_id, RoomSettings::default());
        room.status = RoomStatus::Playing;

        let mut seats = HashMap::new();
        seats.insert(host_id, Seat::new_host(host_id, "Host".into(), "x".into()));

        let abandoned_id = UserId::new_v4();
        let mut abandoned = Seat::new_guest(abandoned_id, "Gone".into(), "y".into());
        abandoned.is_connected = false;
        abandoned.reconnect_deadline = Some(Utc::now() - chrono::Duration::seconds(1));
        seats.insert(abandoned_id, abandoned);

        let game = GameState::default();
        let update = LobbyProjector::build(&room, &seats, &game, 0, &HashMap::new(), Utc::now());

        assert_eq!(update.player_count, 1);
        assert_eq!(update.players.len(), 2);
    }

    #[test]
    fn spectator_count_of_zero_still_publishes() {
        let host_id = UserId::new_v4();
        let room = RoomState::new("ABC234".into(), host_id, RoomSettings::default());
        let mut seats = HashMap::new();
        seats.insert(host_id, Seat::new_host(host_id, "Host".into(), "x".into()));
        let game = GameState::default();

        let update = LobbyProjector::build(&room, &seats, &game, 0, &HashMap::new(), Utc::now());
        assert_eq!(update.spectator_count, 0);
    }
}

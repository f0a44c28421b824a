//! §4.2: persistent map userId -> Seat, and the connect/disconnect/reclaim
//! transitions. Grounded in the teacher's `ReconnectionManager` grace-window
//! pattern (`reconnection.rs`), generalized from "manager over many rooms"
//! to "seat map owned by one room."

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::protocol::{ErrorCode, RoomStatus, Seat, UserId, GRACE_MS};

pub enum AttachOutcome {
    Reconnected,
    Created { is_host: bool },
}

pub struct SeatLedger;

impl SeatLedger {
    /// §4.2 `attach`. Refuses reconnection into a reclaimable seat (the
    /// caller should instead treat the request as a fresh join, which itself
    /// fails `ROOM_FULL` if the room has no room left). Creates the first
    /// seat as host.
    pub fn attach(
        seats: &mut HashMap<UserId, Seat>,
        room_status: RoomStatus,
        max_players: u8,
        user_id: UserId,
        display_name: String,
        avatar_seed: String,
        now: DateTime<Utc>,
    ) -> Result<AttachOutcome, ErrorCode> {
        if let Some(seat) = seats.get_mut(&user_id) {
            // Mirrors `reclaim`'s own carve-out: while playing or paused the
            // seat stays reconnectable past the ordinary grace window (a
            // paused room's reconnect deadline is the 30-minute pause
            // timeout, not the 60-second grace period).
            let blocked = room_status != RoomStatus::Playing
                && room_status != RoomStatus::Paused
                && seat.is_reclaimable(now);
            if blocked {
                return Err(ErrorCode::RoomFull);
            }
            seat.reconnect();
            return Ok(AttachOutcome::Reconnected);
        }

        if room_status != RoomStatus::Waiting {
            return Err(ErrorCode::GameInProgress);
        }
        if seats.len() as u8 >= max_players {
            return Err(ErrorCode::RoomFull);
        }

        let is_host = seats.is_empty();
        let seat = if is_host {
            Seat::new_host(user_id, display_name, avatar_seed)
        } else {
            Seat::new_guest(user_id, display_name, avatar_seed)
        };
        seats.insert(user_id, seat);
        Ok(AttachOutcome::Created { is_host })
    }

    /// §4.2 `detach`. Returns the reconnect deadline the caller should
    /// schedule a seat-expiry alarm against, if the seat existed.
    pub fn detach(
        seats: &mut HashMap<UserId, Seat>,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let seat = seats.get_mut(user_id)?;
        seat.detach(now);
        seat.reconnect_deadline
    }

    /// §4.2 `reclaim`. Only removes the seat once it is both past its
    /// deadline and the room is not `playing`; during `playing`/`paused` the
    /// seat is left in place so `playerOrder` stays stable and the seat is
    /// merely surfaced as `abandoned` by presence derivation.
    pub fn reclaim(
        seats: &mut HashMap<UserId, Seat>,
        user_id: &UserId,
        room_status: RoomStatus,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(seat) = seats.get(user_id) else {
            return false;
        };
        if !seat.is_reclaimable(now) {
            return false;
        }
        if room_status == RoomStatus::Playing || room_status == RoomStatus::Paused {
            return false;
        }
        seats.remove(user_id);
        true
    }

    /// Count of seats currently connected, used by `start_game` (>= 2) and
    /// the pause-detection check (all-disconnected while playing).
    pub fn connected_count(seats: &HashMap<UserId, Seat>) -> usize {
        seats.values().filter(|seat| seat.is_connected).count()
    }

    pub const GRACE_MILLIS: i64 = GRACE_MS;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn first_seat_becomes_host() {
        let mut seats = HashMap::new();
        let user_id = UserId::new_v4();
        let outcome =
            SeatLedger::attach(&mut seats, RoomStatus::Waiting, 4, user_id, "A".into(), "x".into(), now())
                .unwrap();
        assert!(matches!(outcome, AttachOutcome::Created { is_host: true }));
    }

    #[test]
    fn second_seat_is_not_host() {
        let mut seats = HashMap::new();
        let host = UserId::new_v4();
        SeatLedger::attach(&mut seats, RoomStatus::Waiting, 4, host, "H".into(), "x".into(), now()).unwrap();
        let guest = UserId::new_v4();
        let outcome =
            SeatLedger::attach(&mut seats, RoomStatus::Waiting, 4, guest, "G".into(), "y".into(), now())
                .unwrap();
        assert!(matches!(outcome, AttachOutcome::Created { is_host: false }));
    }

    #[test]
    fn join_rejected_once_room_is_full() {
        let mut seats = HashMap::new();
        for _ in 0..4 {
            SeatLedger::attach(&mut seats, RoomStatus::Waiting, 4, UserId::new_v4(), "P".into(), "x".into(), now())
                .unwrap();
        }
        let result = SeatLedger::attach(&mut seats, RoomStatus::Waiting, 4, UserId::new_v4(), "P".into(), "x".into(), now());
        assert!(matches!(result, Err(ErrorCode::RoomFull)));
    }

    #[test]
    fn detach_then_reattach_within_grace_reconnects() {
        let mut seats = HashMap::new();
        let user_id = UserId::new_v4();
        SeatLedger::attach(&mut seats, RoomStatus::Waiting, 4, user_id, "A".into(), "x".into(), now()).unwrap();
        let t0 = now();
        SeatLedger::detach(&mut seats, &user_id, t0);
        assert!(!seats[&user_id].is_connected);

        let outcome = SeatLedger::attach(
            &mut seats,
            RoomStatus::Playing,
            4,
            user_id,
            "A".into(),
            "x".into(),
            t0 + chrono::Duration::seconds(30),
        )
        .unwrap();
        assert!(matches!(outcome, AttachOutcome::Reconnected));
        assert!(seats[&user_id].is_connected);
    }

    #[test]
    fn reclaim_refuses_while_playing() {
        let mut seats = HashMap::new();
        let user_id = UserId::new_v4();
        SeatLedger::attach(&mut seats, RoomStatus::Waiting, 4, user_id, "A".into(), "x".into(), now()).unwrap();
        let t0 = now();
        SeatLedger::detach(&mut seats, &user_id, t0);
        let past_deadline = t0 + chrono::Duration::milliseconds(SeatLedger::GRACE_MILLIS + 1000);
        assert!(!SeatLedger::reclaim(&mut seats, &user_id, RoomStatus::Playing, past_deadline));
        assert!(seats.contains_key(&user_id));
        assert!(SeatLedger::reclaim(&mut seats, &user_id, RoomStatus::Waiting, past_deadline));
        assert!(!seats.contains_key(&user_id));
    }
}

//! §4.5 AlarmScheduler: coalesces every pending deadline the room is
//! tracking -- the current turn's timeout, a room-wide pause timeout, and
//! one seat-expiry per disconnected player -- into the single `alarm_data`
//! record and arms exactly one runtime timer against the nearest of them.
//! No teacher analogue exists (the teacher's rooms run on a fixed heartbeat
//! tick, not a durable single-alarm model); built from the design note in
//! §9: "a coalescer that records pending deadlines in storage and
//! reprograms the nearest after each pass."

use chrono::{DateTime, Utc};

use crate::protocol::{
    AlarmData, AlarmKind, PendingAlarm, RoomStatus, UserId, AFK_TIMEOUT_SECONDS, AFK_WARNING_SECONDS,
    PAUSE_TIMEOUT_MINUTES,
};

pub struct AlarmScheduler;

/// What `on_alarm` found due, in the order it should be processed.
pub enum FiredAlarm {
    TurnTimeout,
    /// §4.2's 45s AFK warning, distinct from the 60s auto-score in
    /// `TurnTimeout`. Carries no payload: the caller resolves the current
    /// player from `GameState` when this fires.
    AfkWarning,
    PauseTimeout,
    SeatExpiry(UserId),
}

impl AlarmScheduler {
    /// Replaces any existing turn-timeout entry (there is at most one turn
    /// in flight at a time) with a fresh deadline, and arms the 45s AFK
    /// warning that precedes it by `AFK_TIMEOUT_SECONDS - AFK_WARNING_SECONDS`.
    pub fn schedule_turn_timeout(data: &mut AlarmData, deadline: DateTime<Utc>, now: DateTime<Utc>) {
        Self::replace(data, AlarmKind::TurnTimeout, None, deadline, now);
        let warning_at = deadline - chrono::Duration::seconds(AFK_TIMEOUT_SECONDS - AFK_WARNING_SECONDS);
        Self::replace(data, AlarmKind::AfkWarning, None, warning_at, now);
    }

    pub fn cancel_turn_timeout(data: &mut AlarmData) {
        data.pending
            .retain(|a| a.kind != AlarmKind::TurnTimeout && a.kind != AlarmKind::AfkWarning);
    }

    pub fn schedule_pause_timeout(data: &mut AlarmData, now: DateTime<Utc>) {
        let deadline = now + chrono::Duration::minutes(PAUSE_TIMEOUT_MINUTES);
        Self::replace(data, AlarmKind::PauseTimeout, None, deadline, now);
    }

    pub fn cancel_pause_timeout(data: &mut AlarmData) {
        data.pending.retain(|a| a.kind != AlarmKind::PauseTimeout);
    }

    /// One seat-expiry entry per disconnected user. Scheduled on `detach`,
    /// cancelled on `reconnect` or once the seat is reclaimed.
    pub fn schedule_seat_expiry(
        data: &mut AlarmData,
        user_id: UserId,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        Self::replace(data, AlarmKind::SeatExpiry, Some(user_id), deadline, now);
    }

    pub fn cancel_seat_expiry(data: &mut AlarmData, user_id: &UserId) {
        data.pending
            .retain(|a| !(a.kind == AlarmKind::SeatExpiry && a.user_id.as_ref() == Some(user_id)));
    }

    fn replace(
        data: &mut AlarmData,
        kind: AlarmKind,
        user_id: Option<UserId>,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        data.pending
            .retain(|a| !(a.kind == kind && a.user_id == user_id));
        data.pending.push(PendingAlarm {
            kind,
            scheduled_at: now,
            deadline,
            user_id,
        });
    }

    /// The single deadline the runtime timer should be armed against: the
    /// nearest pending entry, or `None` if nothing is outstanding.
    pub fn next_fire_at(data: &AlarmData) -> Option<DateTime<Utc>> {
        data.pending.iter().map(|a| a.deadline).min()
    }

    /// `on_alarm` (§4.5): pulls every entry whose deadline has passed,
    /// oldest first, so a turn timeout and a seat expiry that land in the
    /// same tick are both processed in one pass instead of needing a
    /// second wakeup. The caller reprograms the timer against
    /// [`Self::next_fire_at`] after acting on the results.
    pub fn take_due(data: &mut AlarmData, now: DateTime<Utc>) -> Vec<FiredAlarm> {
        let mut due: Vec<PendingAlarm> = Vec::new();
        data.pending.retain(|a| {
            if a.deadline <= now {
                due.push(a.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|a| a.deadline);
        due.into_iter()
            .map(|a| match a.kind {
                AlarmKind::TurnTimeout => FiredAlarm::TurnTimeout,
                AlarmKind::AfkWarning => FiredAlarm::AfkWarning,
                AlarmKind::PauseTimeout => FiredAlarm::PauseTimeout,
                AlarmKind::SeatExpiry => {
                    FiredAlarm::SeatExpiry(a.user_id.expect("seat_expiry alarm always carries a user_id"))
                }
            })
            .collect()
    }

    /// Pause semantics (§4.5): once every seat goes disconnected while a
    /// game is in progress, the room transitions to `paused`, records
    /// `pausedAt=now`, and arms a 30-minute pause timeout. Returns `true` if
    /// this call caused the transition (so the caller broadcasts
    /// `room.paused` exactly once).
    pub fn maybe_pause(
        status: &mut RoomStatus,
        paused_at: &mut Option<DateTime<Utc>>,
        data: &mut AlarmData,
        connected_count: usize,
        now: DateTime<Utc>,
    ) -> bool {
        if *status == RoomStatus::Playing && connected_count == 0 {
            *status = RoomStatus::Paused;
            *paused_at = Some(now);
            Self::cancel_turn_timeout(data);
            Self::schedule_pause_timeout(data, now);
            true
        } else {
            false
        }
    }

    /// A reconnection into a paused room resumes play, clears `pausedAt`,
    /// and re-arms the turn timeout against `turn_deadline`. Returns `true`
    /// if resumed.
    pub fn maybe_resume(
        status: &mut RoomStatus,
        paused_at: &mut Option<DateTime<Utc>>,
        data: &mut AlarmData,
        turn_deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        if *status == RoomStatus::Paused {
            *status = RoomStatus::Playing;
            *paused_at = None;
            Self::cancel_pause_timeout(data);
            Self::schedule_turn_timeout(data, turn_deadline, now);
            true
        } else {
            false
        }
    }
}

//! §4.8 SpectatorFanout: a separate broadcast channel for read-only
//! observers, identified by the `role:spectator` tag. No seat is reserved
//! and disconnection is immediate and ungraced. Grounded in the teacher's
//! `SpectatorService` (join/leave/detach over a side map, not the seat
//! ledger).

use std::collections::{HashMap, HashSet};

use crate::protocol::UserId;

#[derive(Debug, Clone)]
pub struct SpectatorInfo {
    pub user_id: UserId,
    pub display_name: String,
}

/// The prediction subsystem is "a small side-ledger" per the glossary, not a
/// full module: which spectators predicted which outcome for a given
/// message/round key.
#[derive(Default)]
pub struct SpectatorFanout {
    spectators: HashMap<UserId, SpectatorInfo>,
    predictions: HashMap<String, HashSet<UserId>>,
}

impl SpectatorFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, user_id: UserId, display_name: String) {
        self.spectators.insert(user_id, SpectatorInfo { user_id, display_name });
    }

    pub fn leave(&mut self, user_id: &UserId) -> bool {
        let removed = self.spectators.remove(user_id).is_some();
        for predictors in self.predictions.values_mut() {
            predictors.remove(user_id);
        }
        removed
    }

    pub fn is_spectator(&self, user_id: &UserId) -> bool {
        self.spectators.contains_key(user_id)
    }

    pub fn count(&self) -> usize {
        self.spectators.len()
    }

    pub fn ids(&self) -> Vec<UserId> {
        self.spectators.keys().copied().collect()
    }

    pub fn record_prediction(&mut self, key: String, user_id: UserId) {
        self.predictions.entry(key).or_default().insert(user_id);
    }

    pub fn predictors_for(&self, key: &str) -> Vec<UserId> {
        self.predictions
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_leave_round_trip() {
        let mut fanout = SpectatorFanout::new();
        let user = UserId::new_v4();
        fanout.join(user, "Watcher".into());
        assert!(fanout.is_spectator(&user));
        assert_eq!(fanout.count(), 1);
        assert!(fanout.leave(&user));
        assert!(!fanout.is_spectator(&user));
    }

    #[test]
    fn predictions_are_cleared_on_leave() {
        let mut fanout = SpectatorFanout::new();
        let user = UserId::new_v4();
        fanout.join(user, "Watcher".into());
        fanout.record_prediction("round-1".into(), user);
        assert_eq!(fanout.predictors_for("round-1"), vec![user]);
        fanout.leave(&user);
        assert!(fanout.predictors_for("round-1").is_empty());
    }
}

//! Property-based tests against the phase machine and the seeded RNG,
//! exercising `GameStateManager` and `Xoshiro128StarStar` directly rather
//! than round-tripping through the wire protocol.

use std::collections::HashMap;

use chrono::Utc;
use dicee_room_server::protocol::{GameState, Phase, Seat, SCORECARD_CATEGORIES};
use dicee_room_server::room::game_state::GameStateManager;
use dicee_room_server::room::rng::Xoshiro128StarStar;
use proptest::prelude::*;

fn two_player_seats() -> (HashMap<uuid::Uuid, Seat>, uuid::Uuid, uuid::Uuid) {
    let host = uuid::Uuid::new_v4();
    let guest = uuid::Uuid::new_v4();
    let mut seats = HashMap::new();
    seats.insert(host, Seat::new_host(host, "H".into(), "x".into()));
    seats.insert(guest, Seat::new_guest(guest, "G".into(), "y".into()));
    (seats, host, guest)
}

/// The phase-pairs the current state machine can actually produce: §4.3's
/// nine conceptual edges, plus the two self-loops the implementation takes
/// for granted (re-rolling while already in `turn_decide`, and AFK
/// auto-score looping a still-current player straight back into
/// `turn_roll` without ever surfacing the transient `turn_score` phase a
/// synchronous auto-score has no observer for).
fn allowed_edges() -> Vec<(Phase, Phase)> {
    Vec::from([
        (Phase::Waiting, Phase::Starting),
        (Phase::Starting, Phase::TurnRoll),
        (Phase::TurnRoll, Phase::TurnDecide),
        (Phase::TurnDecide, Phase::TurnDecide),
        (Phase::TurnDecide, Phase::TurnRoll),
        (Phase::TurnDecide, Phase::GameOver),
        (Phase::TurnRoll, Phase::TurnRoll),
        (Phase::TurnRoll, Phase::GameOver),
        (Phase::GameOver, Phase::Waiting),
    ])
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Roll([bool; 5]),
    ScoreFirstOpen,
    Afk,
}

prop_compose! {
    fn arb_action()(roll_or_score in 0u8..3, kept in proptest::array::uniform5(any::<bool>())) -> Action {
        match roll_or_score {
            0 => Action::Roll(kept),
            1 => Action::ScoreFirstOpen,
            _ => Action::Afk,
        }
    }
}

proptest! {
    /// P1: every phase transition the state machine produces, across any
    /// sequence of commands legal at the moment they're issued, lands in
    /// the documented reachable set.
    #[test]
    fn phase_transitions_stay_within_reachable_edges(actions in proptest::collection::vec(arb_action(), 1..40)) {
        let mut game = GameState::default();
        let (seats, host, _guest) = two_player_seats();
        let allowed = allowed_edges();

        GameStateManager::start_game(&mut game, &seats, host, true).unwrap();
        prop_assert!(allowed.contains(&(Phase::Waiting, game.phase)));

        let mut rng = Xoshiro128StarStar::seeded("PROPTEST", Utc::now());
        let first = GameStateManager::begin_first_turn(&mut game, Utc::now()).unwrap();
        prop_assert!(allowed.contains(&(Phase::Starting, game.phase)));
        let _ = first;

        for action in actions {
            if game.phase == Phase::GameOver {
                let before = game.phase;
                GameStateManager::rematch(&mut game, true).unwrap();
                prop_assert!(allowed.contains(&(before, game.phase)));
                GameStateManager::start_game(&mut game, &seats, host, true).unwrap();
                GameStateManager::begin_first_turn(&mut game, Utc::now()).unwrap();
                continue;
            }

            let current = game.current_player();
            let Some(current) = current else { break };
            let before = game.phase;

            match action {
                Action::Roll(kept) => {
                    let rolls_remaining = game.players.get(&current).map(|p| p.rolls_remaining).unwrap_or(0);
                    if rolls_remaining == 0 {
                        continue;
                    }
                    let _ = GameStateManager::roll(&mut game, current, kept, &mut rng).unwrap();
                }
                Action::ScoreFirstOpen => {
                    if game.phase != Phase::TurnDecide {
                        continue;
                    }
                    let open = {
                        let player = &game.players[&current];
                        SCORECARD_CATEGORIES.iter().copied().find(|c| !player.scorecard.slots.contains_key(c))
                    };
                    let Some(category) = open else { continue };
                    let _ = GameStateManager::score_category(&mut game, current, category).unwrap();
                }
                Action::Afk => {
                    let _ = GameStateManager::afk_auto_score(&mut game, current);
                }
            }

            prop_assert!(
                allowed.contains(&(before, game.phase)),
                "unexpected transition {:?} -> {:?}",
                before,
                game.phase
            );
        }
    }

    /// P6: two RNGs seeded identically and driven through the same sequence
    /// of kept-masks produce byte-identical rolls at every step.
    #[test]
    fn same_seed_same_command_sequence_is_byte_identical(
        room_code in "[A-Z]{6}",
        masks in proptest::collection::vec(proptest::array::uniform5(any::<bool>()), 1..50),
    ) {
        let started_at = Utc::now();
        let mut game_a = GameState::default();
        let (seats, host, _guest) = two_player_seats();
        GameStateManager::start_game(&mut game_a, &seats, host, true).unwrap();
        let player_a = GameStateManager::begin_first_turn(&mut game_a, started_at).unwrap();
        // `start_game`'s seat shuffle draws from a global, unseeded RNG (a
        // deliberately separate path from the deterministic per-room dice
        // RNG under test here), so `game_b` is cloned from `game_a` instead
        // of independently started -- this property is about the dice RNG
        // replaying identically given the same game state, not about two
        // shuffles agreeing.
        let mut game_b = game_a.clone();
        let player_b = player_a;

        let mut rng_a = Xoshiro128StarStar::seeded(&room_code, started_at);
        let mut rng_b = Xoshiro128StarStar::seeded(&room_code, started_at);

        for mask in masks {
            let rolls_remaining = game_a.players.get(&player_a).map(|p| p.rolls_remaining).unwrap_or(0);
            if rolls_remaining == 0 {
                break;
            }
            let outcome_a = GameStateManager::roll(&mut game_a, player_a, mask, &mut rng_a).unwrap();
            let outcome_b = GameStateManager::roll(&mut game_b, player_b, mask, &mut rng_b).unwrap();
            prop_assert_eq!(outcome_a.dice, outcome_b.dice);
            prop_assert_eq!(outcome_a.rolls_remaining, outcome_b.rolls_remaining);
        }
    }
}

//! §4.3 GameStateManager: the turn state machine, dice/scorecard mutation,
//! and phase transitions. Style grounded in `protocol/room_state.rs`'s
//! explicit boolean-returning transition methods and ASCII phase diagram;
//! the dice/turn semantics themselves have no teacher analogue.
//!
//! ```text
//! waiting      -> starting
//! starting     -> turn_roll
//! turn_roll    -> turn_roll | turn_decide | game_over   (re-roll | keep some | AFK with no roll left)
//! turn_decide  -> turn_decide | turn_roll | game_over   (re-roll | score and pass | AFK mid-turn)
//! game_over    -> waiting                                (rematch)
//! ```
//!
//! `turn_score` exists on [`Phase`] but is never assigned: `score_category`
//! and `afk_auto_score` resolve a score and the turn advance in the same
//! synchronous call, landing directly on `turn_roll` or `game_over` with no
//! suspension point in between for anything to observe it mid-transition.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::rng::Xoshiro128StarStar;
use crate::protocol::{
    Category, ErrorCode, GameState, Phase, PlayerGameState, Ranking, Seat, UserId,
    SCORECARD_CATEGORIES,
};
use crate::scoring::score;

pub struct GameStateManager;

pub struct RollOutcome {
    pub dice: [u8; 5],
    pub rolls_remaining: u8,
}

pub struct ScoreOutcome {
    pub points: i32,
    pub total_score: i32,
    pub is_dicee_bonus: bool,
    pub game_over: bool,
    pub next_player: Option<UserId>,
    pub turn_number: u8,
    pub round_number: u8,
}

pub struct SkipOutcome {
    pub category_scored: Category,
    pub score: i32,
    pub next_player: Option<UserId>,
    pub turn_number: u8,
    pub round_number: u8,
}

impl GameStateManager {
    /// §4.3 `start_game`. Requires `phase=waiting`, caller `isHost`, and at
    /// least two connected seats. Randomizes `playerOrder` from currently
    /// connected seats and moves to `starting`; the caller is responsible
    /// for broadcasting the 3s countdown and invoking
    /// [`Self::begin_first_turn`] once it elapses.
    pub fn start_game(
        game: &mut GameState,
        seats: &HashMap<UserId, Seat>,
        caller: UserId,
        caller_is_host: bool,
    ) -> Result<Vec<UserId>, ErrorCode> {
        if game.phase != Phase::Waiting {
            return Err(ErrorCode::InvalidPhase);
        }
        if !caller_is_host {
            return Err(ErrorCode::NotHost);
        }
        let mut connected: Vec<UserId> = seats
            .values()
            .filter(|seat| seat.is_connected)
            .map(|seat| seat.user_id)
            .collect();
        if connected.len() < 2 {
            return Err(ErrorCode::NotEnoughPlayers);
        }
        let _ = caller;

        use rand::seq::SliceRandom;
        connected.shuffle(&mut rand::rng());

        game.phase = Phase::Starting;
        game.player_order = connected.clone();
        game.players = connected
            .iter()
            .map(|id| (*id, PlayerGameState::default()))
            .collect();
        game.turn_number = 1;
        game.round_number = 1;
        game.game_started_at = Some(Utc::now());
        game.game_completed_at = None;
        game.rankings = None;

        Ok(connected)
    }

    /// Completes the deferred `starting -> turn_roll` transition after the
    /// countdown broadcast.
    pub fn begin_first_turn(game: &mut GameState, now: DateTime<Utc>) -> Result<UserId, ErrorCode> {
        if game.phase != Phase::Starting {
            return Err(ErrorCode::InvalidPhase);
        }
        let first = game
            .player_order
            .first()
            .copied()
            .ok_or(ErrorCode::NotEnoughPlayers)?;
        game.phase = Phase::TurnRoll;
        game.current_player_index = 0;
        game.turn_started_at = Some(now);
        if let Some(state) = game.players.get_mut(&first) {
            state.rolls_remaining = 3;
        }
        Ok(first)
    }

    /// §4.3 `dice.roll(kept_mask)`.
    pub fn roll(
        game: &mut GameState,
        caller: UserId,
        kept_mask: [bool; 5],
        rng: &mut Xoshiro128StarStar,
    ) -> Result<RollOutcome, ErrorCode> {
        if !matches!(game.phase, Phase::TurnRoll | Phase::TurnDecide) {
            return Err(ErrorCode::InvalidPhase);
        }
        if game.current_player() != Some(caller) {
            return Err(ErrorCode::NotYourTurn);
        }
        let player = game
            .players
            .get_mut(&caller)
            .ok_or(ErrorCode::InvalidPhase)?;
        if player.rolls_remaining == 0 {
            return Err(ErrorCode::NoRollsRemaining);
        }

        let previous = player.current_dice.unwrap_or([0; 5]);
        let mut dice = [0u8; 5];
        for i in 0..5 {
            dice[i] = if kept_mask[i] && previous[i] != 0 {
                previous[i]
            } else {
                rng.roll_die()
            };
        }
        player.current_dice = Some(dice);
        player.kept_dice = None;
        player.rolls_remaining -= 1;
        let rolls_remaining = player.rolls_remaining;

        game.phase = Phase::TurnDecide;

        Ok(RollOutcome {
            dice,
            rolls_remaining,
        })
    }

    /// §4.3 `dice.keep(indices)`. Pure UI hint; never changes phase.
    pub fn keep(
        game: &mut GameState,
        caller: UserId,
        indices: &[u8],
    ) -> Result<[bool; 5], ErrorCode> {
        if game.phase != Phase::TurnDecide {
            return Err(ErrorCode::InvalidPhase);
        }
        if game.current_player() != Some(caller) {
            return Err(ErrorCode::NotYourTurn);
        }
        let mut mask = [false; 5];
        for &index in indices {
            if let Some(slot) = mask.get_mut(index as usize) {
                *slot = true;
            }
        }
        if let Some(player) = game.players.get_mut(&caller) {
            player.kept_dice = Some(mask);
        }
        Ok(mask)
    }

    /// §4.3 `category.score(category)`.
    pub fn score_category(
        game: &mut GameState,
        caller: UserId,
        category: Category,
    ) -> Result<ScoreOutcome, ErrorCode> {
        if game.phase != Phase::TurnDecide {
            return Err(ErrorCode::InvalidPhase);
        }
        if game.current_player() != Some(caller) {
            return Err(ErrorCode::NotYourTurn);
        }

        let dice = game
            .players
            .get(&caller)
            .and_then(|player| player.current_dice)
            .ok_or(ErrorCode::InvalidPhase)?;

        let player = game.players.get_mut(&caller).unwrap();
        if player.scorecard.slots.contains_key(&category) {
            return Err(ErrorCode::CategoryAlreadyScored);
        }

        // Resolved open question: the dicee slot must already hold a value
        // before a later five-of-a-kind adds to the bonus. Since this call
        // just asserted the slot is empty, this branch structurally cannot
        // fire for the write that first fills the slot -- by design, not by
        // omission (see DESIGN.md).
        let dicee_already_scored = player.scorecard.slots.contains_key(&Category::Dicee);
        let is_dicee_bonus = category == Category::Dicee
            && dicee_already_scored
            && is_five_of_a_kind(&dice);

        let points = score(&dice, category);
        player.scorecard.slots.insert(category, points);
        if is_dicee_bonus {
            player.scorecard.dicee_bonus += 100;
        }
        let total_score = player.scorecard.total_score();

        if Self::is_game_complete(game) {
            Self::finish_game(game);
            return Ok(ScoreOutcome {
                points,
                total_score,
                is_dicee_bonus,
                game_over: true,
                next_player: None,
                turn_number: game.turn_number,
                round_number: game.round_number,
            });
        }

        let next_player = Self::advance_turn(game);
        Ok(ScoreOutcome {
            points,
            total_score,
            is_dicee_bonus,
            game_over: false,
            next_player,
            turn_number: game.turn_number,
            round_number: game.round_number,
        })
    }

    /// AFK auto-score (§4.3): fires when the turn alarm elapses while the
    /// same player is still current. Picks the first open category in
    /// deterministic order and scores the player's current dice (or a
    /// default `[1,1,1,1,1]` if no roll has happened yet this turn).
    pub fn afk_auto_score(game: &mut GameState, current_player: UserId) -> SkipOutcome {
        let dice = game
            .players
            .get(&current_player)
            .and_then(|player| player.current_dice)
            .unwrap_or([1, 1, 1, 1, 1]);

        let category = {
            let player = game.players.get(&current_player).unwrap();
            SCORECARD_CATEGORIES
                .iter()
                .copied()
                .find(|category| !player.scorecard.slots.contains_key(category))
                .expect("afk_auto_score called with a complete scorecard")
        };

        let points = score(&dice, category);
        let player = game.players.get_mut(&current_player).unwrap();
        player.scorecard.slots.insert(category, points);

        if Self::is_game_complete(game) {
            Self::finish_game(game);
            return SkipOutcome {
                category_scored: category,
                score: points,
                next_player: None,
                turn_number: game.turn_number,
                round_number: game.round_number,
            };
        }

        let next_player = Self::advance_turn(game);
        SkipOutcome {
            category_scored: category,
            score: points,
            next_player,
            turn_number: game.turn_number,
            round_number: game.round_number,
        }
    }

    /// §4.3 `rematch`. Requires `phase=game_over`, caller `isHost`. Resets
    /// per-player game state; seats are untouched by the caller.
    pub fn rematch(game: &mut GameState, caller_is_host: bool) -> Result<(), ErrorCode> {
        if game.phase != Phase::GameOver {
            return Err(ErrorCode::InvalidPhase);
        }
        if !caller_is_host {
            return Err(ErrorCode::NotHost);
        }
        *game = GameState::default();
        Ok(())
    }

    fn advance_turn(game: &mut GameState) -> Option<UserId> {
        let n = game.player_order.len();
        game.current_player_index = (game.current_player_index + 1) % n;
        game.turn_number += 1;
        if game.current_player_index == 0 {
            game.round_number += 1;
        }
        let next = game.current_player();
        if let Some(next_id) = next {
            if let Some(state) = game.players.get_mut(&next_id) {
                state.rolls_remaining = 3;
                state.current_dice = None;
                state.kept_dice = None;
            }
        }
        game.phase = Phase::TurnRoll;
        game.turn_started_at = Some(Utc::now());
        next
    }

    fn is_game_complete(game: &GameState) -> bool {
        game.player_order
            .iter()
            .all(|id| game.players.get(id).is_some_and(|p| p.scorecard.is_complete()))
    }

    fn finish_game(game: &mut GameState) {
        game.phase = Phase::GameOver;
        game.game_completed_at = Some(Utc::now());

        let mut rankings: Vec<Ranking> = game
            .player_order
            .iter()
            .map(|id| {
                let player = &game.players[id];
                Ranking {
                    user_id: *id,
                    total_score: player.scorecard.total_score(),
                    dicee_count: player.scorecard.dicee_count(),
                }
            })
            .collect();
        rankings.sort_by(|a, b| {
            b.total_score
                .cmp(&a.total_score)
                .then(b.dicee_count.cmp(&a.dicee_count))
                .then(a.user_id.cmp(&b.user_id))
        });
        game.rankings = Some(rankings);
    }
}

fn is_five_of_a_kind(dice: &[u8; 5]) -> bool {
    dice.iter().all(|&d| d == dice[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Seat;

    fn seat(user_id: UserId, is_host: bool) -> Seat {
        if is_host {
            Seat::new_host(user_id, "P".into(), "x".into())
        } else {
            Seat::new_guest(user_id, "P".into(), "x".into())
        }
    }

    #[test]
    fn start_game_requires_host_and_two_players() {
        let mut game = GameState::default();
        let host = UserId::new_v4();
        let mut seats = HashMap::new();
        seats.insert(host, seat(host, true));
        let result = GameStateManager::start_game(&mut game, &seats, host, true);
        assert!(matches!(result, Err(ErrorCode::NotEnoughPlayers)));

        let guest = UserId::new_v4();
        seats.insert(guest, seat(guest, false));
        let result = GameStateManager::start_game(&mut game, &seats, guest, false);
        assert!(matches!(result, Err(ErrorCode::NotHost)));
    }

    #[test]
    fn happy_path_two_player_round() {
        let mut game = GameState::default();
        let host = UserId::new_v4();
        let guest = UserId::new_v4();
        let mut seats = HashMap::new();
        seats.insert(host, seat(host, true));
        seats.insert(guest, seat(guest, false));

        GameStateManager::start_game(&mut game, &seats, host, true).unwrap();
        let first = GameStateManager::begin_first_turn(&mut game, Utc::now()).unwrap();

        let mut rng = Xoshiro128StarStar::seeded("ABC234", Utc::now());
        let roll = GameStateManager::roll(&mut game, first, [false; 5], &mut rng).unwrap();
        assert_eq!(roll.rolls_remaining, 2);
        assert_eq!(game.phase, Phase::TurnDecide);

        let outcome = GameStateManager::score_category(&mut game, first, Category::Chance).unwrap();
        assert!(!outcome.is_dicee_bonus);
        assert!(!outcome.game_over);
        assert_eq!(game.phase, Phase::TurnRoll);
        assert_eq!(game.turn_number, 2);
        assert_eq!(game.current_player(), Some(if first == host { guest } else { host }));
    }

    #[test]
    fn category_cannot_be_scored_twice() {
        let mut game = GameState::default();
        let host = UserId::new_v4();
        let guest = UserId::new_v4();
        let mut seats = HashMap::new();
        seats.insert(host, seat(host, true));
        seats.insert(guest, seat(guest, false));
        GameStateManager::start_game(&mut game, &seats, host, true).unwrap();
        let first = GameStateManager::begin_first_turn(&mut game, Utc::now()).unwrap();
        let mut rng = Xoshiro128StarStar::seeded("ABC234", Utc::now());
        GameStateManager::roll(&mut game, first, [false; 5], &mut rng).unwrap();
        game.players.get_mut(&first).unwrap().current_dice = Some([1, 1, 1, 1, 1]);
        game.phase = Phase::TurnDecide;
        GameStateManager::score_category(&mut game, first, Category::Ones).unwrap();
        game.phase = Phase::TurnDecide;
        game.current_player_index = game
            .player_order
            .iter()
            .position(|&id| id == first)
            .unwrap();
        game.players.get_mut(&first).unwrap().current_dice = Some([1, 1, 1, 1, 1]);
        let result = GameStateManager::score_category(&mut game, first, Category::Ones);
        assert!(matches!(result, Err(ErrorCode::CategoryAlreadyScored)));
    }

    #[test]
    fn afk_auto_score_picks_first_open_category() {
        let mut game = GameState::default();
        let host = UserId::new_v4();
        let guest = UserId::new_v4();
        let mut seats = HashMap::new();
        seats.insert(host, seat(host, true));
        seats.insert(guest, seat(guest, false));
        GameStateManager::start_game(&mut game, &seats, host, true).unwrap();
        let first = GameStateManager::begin_first_turn(&mut game, Utc::now()).unwrap();
        game.players.get_mut(&first).unwrap().current_dice = Some([1, 1, 2, 3, 4]);

        let outcome = GameStateManager::afk_auto_score(&mut game, first);
        assert_eq!(outcome.category_scored, Category::Ones);
        assert_eq!(outcome.score, 2);
    }

    #[test]
    fn rematch_resets_state_but_requires_host() {
        let mut game = GameState::default();
        game.phase = Phase::GameOver;
        assert!(matches!(
            GameStateManager::rematch(&mut game, false),
            Err(ErrorCode::NotHost)
        ));
        GameStateManager::rematch(&mut game, true).unwrap();
        assert_eq!(game.phase, Phase::Waiting);
    }
}

//! The dice-scoring rules library is out of scope as a *system* (§1) but the
//! pure function itself has no external dependency, so it lives here as a
//! free function per the glossary's framing: `score(dice, category) -> int`.

use crate::protocol::Category;
use std::collections::HashMap;

fn counts(dice: &[u8; 5]) -> HashMap<u8, u8> {
    let mut counts = HashMap::new();
    for &face in dice {
        *counts.entry(face).or_insert(0u8) += 1;
    }
    counts
}

fn is_five_of_a_kind(dice: &[u8; 5]) -> bool {
    counts(dice).values().any(|&count| count == 5)
}

fn has_n_of_a_kind(dice: &[u8; 5], n: u8) -> bool {
    counts(dice).values().any(|&count| count >= n)
}

fn is_full_house(dice: &[u8; 5]) -> bool {
    let mut values: Vec<u8> = counts(dice).values().copied().collect();
    values.sort_unstable();
    values == [2, 3] || values == [5]
}

fn has_straight(dice: &[u8; 5], run_len: usize) -> bool {
    let mut faces: Vec<u8> = dice.to_vec();
    faces.sort_unstable();
    faces.dedup();
    faces
        .windows(run_len)
        .any(|window| window.windows(2).all(|pair| pair[1] - pair[0] == 1))
}

/// Scores one category against a fixed set of five dice. Deterministic and
/// side-effect free, as required for AFK auto-scoring and replay (P6).
pub fn score(dice: &[u8; 5], category: Category) -> i32 {
    let sum = |face: u8| dice.iter().filter(|&&d| d == face).map(|_| face as i32).sum();
    match category {
        Category::Ones => sum(1),
        Category::Twos => sum(2),
        Category::Threes => sum(3),
        Category::Fours => sum(4),
        Category::Fives => sum(5),
        Category::Sixes => sum(6),
        Category::ThreeOfAKind => {
            if has_n_of_a_kind(dice, 3) {
                dice.iter().map(|&d| d as i32).sum()
            } else {
                0
            }
        }
        Category::FourOfAKind => {
            if has_n_of_a_kind(dice, 4) {
                dice.iter().map(|&d| d as i32).sum()
            } else {
                0
            }
        }
        Category::FullHouse => {
            if is_full_house(dice) {
                25
            } else {
                0
            }
        }
        Category::SmallStraight => {
            if has_straight(dice, 4) {
                30
            } else {
                0
            }
        }
        Category::LargeStraight => {
            if has_straight(dice, 5) {
                40
            } else {
                0
            }
        }
        Category::Dicee => {
            if is_five_of_a_kind(dice) {
                50
            } else {
                0
            }
        }
        Category::Chance => dice.iter().map(|&d| d as i32).sum(),
    }
}

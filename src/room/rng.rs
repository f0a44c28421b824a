//! Seeded PRNG for dice rolls (§4.3: "xoshiro128**"). Implemented directly
//! rather than reached for a crate dependency since the persisted state must
//! be a fixed-size, serialization-stable byte array we control (§6: `rng_state`
//! is a plain JSON value) and replay-identical across process restarts (P6).

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
pub struct Xoshiro128StarStar {
    state: [u32; 4],
}

impl Xoshiro128StarStar {
    /// Seeds from the room code and the game's start time, per §4.3.
    pub fn seeded(room_code: &str, game_started_at: DateTime<Utc>) -> Self {
        let mut seed = splitmix64(room_code.bytes().fold(
            game_started_at.timestamp_millis() as u64,
            |acc, byte| acc.wrapping_mul(31).wrapping_add(byte as u64),
        ));
        let mut state = [0u32; 4];
        for slot in &mut state {
            seed = splitmix64(seed);
            *slot = (seed & 0xFFFF_FFFF) as u32;
        }
        // xoshiro128** requires a non-zero state.
        if state.iter().all(|&word| word == 0) {
            state[0] = 1;
        }
        Self { state }
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut state = [0u32; 4];
        for (i, word) in state.iter_mut().enumerate() {
            let offset = i * 4;
            *word = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        }
        Self { state }
    }

    pub fn to_bytes(self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        for (i, word) in self.state.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    fn next_u32(&mut self) -> u32 {
        let result = self.state[1]
            .wrapping_mul(5)
            .rotate_left(7)
            .wrapping_mul(9);

        let t = self.state[1] << 9;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(11);

        result
    }

    /// Rolls one die, values 1..=6.
    pub fn roll_die(&mut self) -> u8 {
        (self.next_u32() % 6) as u8 + 1
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let started_at = Utc::now();
        let mut a = Xoshiro128StarStar::seeded("ABC234", started_at);
        let mut b = Xoshiro128StarStar::seeded("ABC234", started_at);
        let rolls_a: Vec<u8> = (0..20).map(|_| a.roll_die()).collect();
        let rolls_b: Vec<u8> = (0..20).map(|_| b.roll_die()).collect();
        assert_eq!(rolls_a, rolls_b);
    }

    #[test]
    fn rolls_stay_in_range() {
        let mut rng = Xoshiro128StarStar::seeded("ZZZ999", Utc::now());
        for _ in 0..500 {
            let roll = rng.roll_die();
            assert!((1..=6).contains(&roll));
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut rng = Xoshiro128StarStar::seeded("QQQ111", Utc::now());
        rng.roll_die();
        rng.roll_die();
        let bytes = rng.to_bytes();
        let mut restored = Xoshiro128StarStar::from_bytes(bytes);
        assert_eq!(rng.roll_die(), restored.roll_die());
    }
}

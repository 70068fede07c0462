//! Deterministic Random Number Generator
//!
//! Xorshift128+ seeded through SplitMix64. Every random decision in the
//! simulation (spawn selection, loot rolls, placement offsets) draws from a
//! single `DeterministicRng` owned by the match, so a seed plus the command
//! stream fully determines the outcome.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::fixed::{Fixed, FIXED_ONE, fixed_mul_wide};

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use dropzone::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a random integer in range [min, max].
    #[inline]
    pub fn next_int_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let range = (max - min + 1) as u32;
        min + self.next_int(range) as i32
    }

    /// Generate a random Fixed in range [0, max).
    #[inline]
    pub fn next_fixed(&mut self, max: Fixed) -> Fixed {
        if max <= 0 {
            return 0;
        }
        let raw = (self.next_u64() >> 32) as u32;
        // Scale to [0, max) range: (raw * max) / 2^32
        ((raw as i64 * max as i64) >> 32) as Fixed
    }

    /// Generate a random Fixed in range [min, max).
    #[inline]
    pub fn next_fixed_range(&mut self, min: Fixed, max: Fixed) -> Fixed {
        if min >= max {
            return min;
        }
        let range = max.wrapping_sub(min);
        min.wrapping_add(self.next_fixed(range))
    }

    /// Generate a random boolean with given probability.
    ///
    /// probability is in range [0, FIXED_ONE] where FIXED_ONE = 100%
    #[inline]
    pub fn next_bool(&mut self, probability: Fixed) -> bool {
        self.next_fixed(FIXED_ONE) < probability
    }

    /// Uniform point on the ground plane within `[-half_extent, half_extent)`
    /// on both axes. Returns `(x, z)`.
    pub fn random_map_point(&mut self, half_extent: Fixed) -> (Fixed, Fixed) {
        let x = self.next_fixed_range(-half_extent, half_extent);
        let z = self.next_fixed_range(-half_extent, half_extent);
        (x, z)
    }

    /// Uniform planar offset inside a disc of `radius`. Returns `(dx, dz)`.
    ///
    /// Rejection sampling; a non-positive radius yields no offset.
    pub fn random_offset_in_disc(&mut self, radius: Fixed) -> (Fixed, Fixed) {
        if radius <= 0 {
            return (0, 0);
        }
        let radius_sq = fixed_mul_wide(radius, radius);
        loop {
            let dx = self.next_fixed_range(-radius, radius);
            let dz = self.next_fixed_range(-radius, radius);
            if fixed_mul_wide(dx, dx) + fixed_mul_wide(dz, dz) <= radius_sq {
                return (dx, dz);
            }
        }
    }

    /// Pick an index with probability proportional to its weight.
    ///
    /// Returns `None` when every weight is zero.
    pub fn weighted_index(&mut self, weights: &[u32]) -> Option<usize> {
        let total: u64 = weights.iter().map(|w| *w as u64).sum();
        if total == 0 {
            return None;
        }
        let mut roll = self.next_u64() % total;
        for (index, weight) in weights.iter().enumerate() {
            let weight = *weight as u64;
            if roll < weight {
                return Some(index);
            }
            roll -= weight;
        }
        None
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(slice.len() as u32) as usize;
            slice.get(idx)
        }
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: [u64; 2]) {
        self.state = state;
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive the seed of one round of a match.
///
/// Every restart of the same match gets a fresh but reproducible seed, so
/// loot placement differs per round while replays stay exact.
pub fn derive_round_seed(match_id: &[u8; 16], base_seed: u64, round: u32) -> u64 {
    let mut hasher = Sha256::new();

    hasher.update(b"DROPZONE_ROUND_SEED_V1");
    hasher.update(match_id);
    hasher.update(base_seed.to_le_bytes());
    hasher.update(round.to_le_bytes());

    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(bytes)
}

// =============================================================================
// TESTS
// =============================================================================

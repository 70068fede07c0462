//! State Hashing for Verification
//!
//! Deterministic SHA-256 digest of the authoritative match state. Hosts and
//! replaying observers compare digests to detect desyncs.

use sha2::{Sha256, Digest};
use super::fixed::Fixed;
use super::vec3::FixedVec3;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for game state.
///
/// Wraps SHA-256 with helpers for fixed-point types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for match state.
    pub fn for_match_state() -> Self {
        Self::new(b"DROPZONE_STATE_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a string, length-prefixed.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a Fixed value.
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a FixedVec3.
    #[inline]
    pub fn update_vec3(&mut self, value: FixedVec3) {
        self.update_fixed(value.x);
        self.update_fixed(value.y);
        self.update_fixed(value.z);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a UUID (16 bytes).
    #[inline]
    pub fn update_uuid(&mut self, uuid: &[u8; 16]) {
        self.hasher.update(uuid);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute state hash for match verification.
///
/// This function is called by `MatchState::compute_hash()`.
/// The parameter is a closure that adds state-specific data.
pub fn compute_state_hash<F>(tick: u32, rng_seed: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_match_state();

    // Always hash tick and seed first
    hasher.update_u32(tick);
    hasher.update_u64(rng_seed);

    add_state(&mut hasher);

    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;

    #[test]
    fn test_state_hasher_determinism() {
        let make_hash = || {
            let mut hasher = StateHasher::for_match_state();
            hasher.update_u32(100);
            hasher.update_fixed(to_fixed(5.5));
            hasher.update_vec3(FixedVec3::from_ints(1, 2, 3));
            hasher.update_str("Bandage");
            hasher.update_bool(true);
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_length_prefix_separates_strings() {
        let a = {
            let mut h = StateHasher::new(b"test");
            h.update_str("ab");
            h.update_str("c");
            h.finalize()
        };
        let b = {
            let mut h = StateHasher::new(b"test");
            h.update_str("a");
            h.update_str("bc");
            h.finalize()
        };
        assert_ne!(a, b);
    }

    #[test]
    fn test_compute_state_hash() {
        let hash = compute_state_hash(100, 12345, |hasher| hasher.update_bool(true));
        let hash2 = compute_state_hash(100, 12345, |hasher| hasher.update_bool(true));
        let hash3 = compute_state_hash(101, 12345, |hasher| hasher.update_bool(true));

        assert_eq!(hash, hash2);
        assert_ne!(hash, hash3);
    }
}

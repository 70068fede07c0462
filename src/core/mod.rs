//! Core deterministic primitives.
//!
//! Fixed-point scalars, positions, the seeded RNG and the state hasher.
//! Nothing in here knows about matches or players.

pub mod fixed;
pub mod vec3;
pub mod rng;
pub mod hash;

// Re-export core types
pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use vec3::FixedVec3;
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};

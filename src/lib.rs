//! # Dropzone Match Server
//!
//! Authoritative battle-royale match simulation: roster, lobby countdown,
//! loot, inventories, health, shrinking zone and win detection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DROPZONE SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - Q16.16 fixed-point arithmetic             │
//! │  ├── vec3.rs     - 3D vector with fixed-point                │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for replay checks           │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── state.rs    - Match and player state                    │
//! │  ├── tick.rs     - Authoritative per-tick step               │
//! │  ├── lifecycle.rs- Lobby → Starting → Playing → Ending       │
//! │  ├── host.rs     - Match owner, recording, event bus         │
//! │  ├── spawner.rs  - World loot                                │
//! │  ├── inventory.rs- Weight-limited inventories                │
//! │  ├── health.rs   - Health, armor, regeneration               │
//! │  └── zone.rs     - Shrinking safe zone                       │
//! │                                                              │
//! │  network/        - Host loop (non-deterministic)             │
//! │  ├── server.rs   - Tokio tick loop and channels              │
//! │  └── protocol.rs - Request and broadcast messages            │
//! │                                                              │
//! │  config.rs       - Match configuration (JSON)                │
//! │  settings.rs     - Persisted key→value settings              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic:
//! - No floating-point arithmetic in game logic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from seeded Xorshift128+, reseeded per round
//!
//! A [`game::MatchRecording`] replayed against the same config produces the
//! same state hash as the live match.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod settings;

// Re-export commonly used types
pub use config::{ConfigError, MatchConfig};
pub use core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use core::vec3::FixedVec3;
pub use core::rng::DeterministicRng;
pub use game::host::MatchHost;
pub use game::input::{CommandFrame, PlayerCommand};
pub use game::state::{MatchState, PlayerState, PlayerId};
pub use settings::SettingsStore;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

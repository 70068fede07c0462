//! Game Logic Module
//!
//! All match simulation code. Deterministic given the seed and the recorded
//! host actions and commands.
//!
//! ## Module Structure
//!
//! - `state`: Match state, player state, identifiers
//! - `input`: Player commands and match recording
//! - `tick`: Authoritative per-tick step
//! - `lifecycle`: Roster and phase transitions, win check
//! - `host`: Single owner of a running match
//! - `events`: Prioritized game events and observers
//! - `loot`, `spawner`: Loot catalog and world loot
//! - `inventory`, `health`: Per-player item and health state
//! - `zone`: Shrinking safe zone
//! - `effects`: Timed effects (reloads, music fades, screen shake)
//! - `world`: Ground-height collaborator

pub mod state;
pub mod input;
pub mod tick;
pub mod lifecycle;
pub mod host;
pub mod events;
pub mod loot;
pub mod spawner;
pub mod inventory;
pub mod health;
pub mod zone;
pub mod effects;
pub mod world;

// Re-export key types
pub use state::{MatchState, PlayerState, PlayerId, GameMode, MatchPhase};
pub use input::{PlayerCommand, CommandFrame, HostAction, MatchRecording};
pub use tick::{TickResult, CommandError};
pub use host::MatchHost;
pub use events::{GameEvent, GameEventData, EventBus, EventSink};
pub use world::{GroundQuery, FlatGround};

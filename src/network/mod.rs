//! Network Layer
//!
//! Async host loop and its wire messages.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod server;

pub use protocol::{HostRequest, BroadcastMessage, MatchSnapshot, PlayerSnapshot};
pub use server::{spawn_host, HostConfig, HostError, HostHandle, BroadcastSink};

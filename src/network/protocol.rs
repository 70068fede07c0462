//! Network Protocol
//!
//! Messages between the host loop and its participants. Requests come in as
//! JSON; broadcasts go out as JSON or bincode. Broadcasts are fire-and-forget:
//! a participant that lags behind the broadcast buffer misses messages and
//! must resync from the next snapshot.

use serde::{Serialize, Deserialize};

use crate::core::fixed::to_float;
use crate::game::events::GameEvent;
use crate::game::input::PlayerCommand;
use crate::game::state::{MatchPhase, MatchState, PlayerId};

// =============================================================================
// REQUESTS (participant → host)
// =============================================================================

/// Request sent to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostRequest {
    /// Enter the roster
    Join {
        /// Player UUID
        player_id: String,
        /// Display name
        name: String,
    },
    /// Leave the roster
    Leave {
        /// Player UUID
        player_id: String,
    },
    /// Gameplay command for the next tick
    Command {
        /// Player UUID
        player_id: String,
        /// The command
        command: PlayerCommand,
    },
    /// Host button: skip the lobby timer
    StartGame,
    /// Host button: new round now
    Restart,
}

impl HostRequest {
    /// Sender id, when the request carries one and it parses.
    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            HostRequest::Join { player_id, .. }
            | HostRequest::Leave { player_id }
            | HostRequest::Command { player_id, .. } => PlayerId::from_uuid_str(player_id),
            HostRequest::StartGame | HostRequest::Restart => None,
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// BROADCASTS (host → participants)
// =============================================================================

/// Message broadcast by the host.
///
/// Externally tagged so the same type encodes with bincode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BroadcastMessage {
    /// One simulation event
    Event(GameEvent),
    /// Periodic read-only view of the match
    Snapshot(MatchSnapshot),
    /// A request could not be applied
    Rejected {
        /// Sender, when known
        player_id: Option<PlayerId>,
        /// Human-readable reason
        reason: String,
    },
}

impl BroadcastMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Read-only view of the match for observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Host tick
    pub tick: u32,
    /// Round counter
    pub round: u32,
    /// Lifecycle phase
    pub phase: MatchPhase,
    /// Roster in id order
    pub players: Vec<PlayerSnapshot>,
    /// Safe-zone radius
    pub zone_radius: f32,
    /// Zone phase index
    pub zone_phase: u32,
    /// Loot instances in the world
    pub loot_count: u32,
    /// State hash (hex) for desync checks
    pub state_hash: String,
}

/// Per-player part of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Player UUID
    pub player_id: String,
    /// Display name
    pub name: String,
    /// Position (x, y, z)
    pub position: (f32, f32, f32),
    /// Health
    pub health: f32,
    /// Armor
    pub armor: f32,
    /// Still alive this round
    pub alive: bool,
    /// Kills this round
    pub kills: u32,
}

impl MatchSnapshot {
    /// Capture the current state.
    pub fn capture(state: &MatchState) -> Self {
        let players = state
            .players
            .values()
            .map(|p| PlayerSnapshot {
                player_id: p.id.to_uuid_string(),
                name: p.name.clone(),
                position: p.position.to_floats(),
                health: to_float(p.health.health),
                armor: to_float(p.health.armor),
                alive: p.alive,
                kills: state.kills_of(&p.id),
            })
            .collect();

        Self {
            tick: state.tick,
            round: state.round,
            phase: state.phase,
            players,
            zone_radius: to_float(state.zone.current_radius()),
            zone_phase: state.zone.phase_index() as u32,
            loot_count: state.spawner.count() as u32,
            state_hash: hex::encode(state.compute_hash()),
        }
    }
}

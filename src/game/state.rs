//! Game State Definitions
//!
//! All state types for match simulation.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::config::MatchConfig;
use crate::core::fixed::Fixed;
use crate::core::vec3::FixedVec3;
use crate::core::rng::{DeterministicRng, derive_round_seed};
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::effects::TimedEffects;
use crate::game::events::GameEvent;
use crate::game::health::HealthState;
use crate::game::inventory::Inventory;
use crate::game::spawner::LootSpawner;
use crate::game::world::GroundQuery;
use crate::game::zone::ZoneController;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id. Only for hosts assigning ids to new connections;
    /// never called inside the simulation.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// First four bytes as hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerId({})", self.short())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

// =============================================================================
// MODE AND PHASE
// =============================================================================

/// Team mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameMode {
    /// Everyone for themselves
    #[default]
    Solo,
    /// Teams of two
    Duo,
    /// Teams of four
    Squad,
}

impl GameMode {
    /// Roster size needed before the lobby timer runs.
    pub fn min_players(self) -> u32 {
        match self {
            GameMode::Solo => 2,
            GameMode::Duo => 4,
            GameMode::Squad => 8,
        }
    }

    /// The match ends once this many or fewer players are alive.
    pub fn alive_threshold(self) -> u32 {
        match self {
            GameMode::Solo => 1,
            GameMode::Duo => 2,
            GameMode::Squad => 4,
        }
    }
}

/// Current phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MatchPhase {
    /// Waiting for players
    #[default]
    Lobby = 0,
    /// Countdown before start
    Starting = 1,
    /// Active gameplay
    Playing = 2,
    /// Match ended, showing results
    Ending = 3,
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// State of a single player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Player identifier
    pub id: PlayerId,

    /// Display name
    pub name: String,

    /// World position
    pub position: FixedVec3,

    /// Planar facing direction (unit length, Y = 0)
    pub facing: FixedVec3,

    /// Still in the fight this round
    pub alive: bool,

    /// Health, armor and capability flags
    pub health: HealthState,

    /// Carried items and equipment
    pub inventory: Inventory,
}

impl PlayerState {
    /// Create a player at a spawn position.
    pub fn new(id: PlayerId, name: String, position: FixedVec3, config: &MatchConfig) -> Self {
        Self {
            id,
            name,
            position,
            facing: FixedVec3::FORWARD,
            alive: true,
            health: HealthState::new(&config.health),
            inventory: Inventory::new(&config.inventory),
        }
    }

    /// Hash player state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_uuid(&self.id.0);
        hasher.update_str(&self.name);
        hasher.update_vec3(self.position);
        hasher.update_vec3(self.facing);
        hasher.update_bool(self.alive);
        self.health.hash_into(hasher);
        self.inventory.hash_into(hasher);
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Match identifier
    pub match_id: [u8; 16],

    /// Seed the match was created with
    pub base_seed: u64,

    /// Round counter, bumped on every restart
    pub round: u32,

    /// Seed of the current round (for verification)
    pub rng_seed: u64,

    /// Deterministic RNG state
    pub rng: DeterministicRng,

    /// Ticks since the match was created
    pub tick: u32,

    /// Seconds since the match was created (Q16.16, widened so a
    /// long-lived host never saturates it)
    pub clock: i64,

    /// Current match phase
    pub phase: MatchPhase,

    /// Seconds spent in the current phase
    pub phase_elapsed: Fixed,

    /// Team mode
    pub mode: GameMode,

    /// Roster (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, PlayerState>,

    /// Kills per roster member
    pub kills: BTreeMap<PlayerId, u32>,

    /// World loot
    pub spawner: LootSpawner,

    /// Shrinking zone
    pub zone: ZoneController,

    /// In-flight timed effects
    pub effects: TimedEffects,

    /// Winner of the last finished round
    pub winner: Option<PlayerId>,

    /// Events generated this tick (cleared each tick)
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a new match state in the lobby.
    ///
    /// Loot spawn points are generated here (when not configured) so every
    /// host with the same seed sees the same points.
    pub fn new(match_id: [u8; 16], seed: u64, config: &MatchConfig, ground: &dyn GroundQuery) -> Self {
        let rng_seed = derive_round_seed(&match_id, seed, 0);
        let mut rng = DeterministicRng::new(rng_seed);
        let spawner = LootSpawner::new(
            config.loot_catalog.clone(),
            config.loot_spawn_points.clone(),
            config.loot.clone(),
            &mut rng,
            ground,
        );

        Self {
            match_id,
            base_seed: seed,
            round: 0,
            rng_seed,
            rng,
            tick: 0,
            clock: 0,
            phase: MatchPhase::Lobby,
            phase_elapsed: 0,
            mode: config.mode,
            players: BTreeMap::new(),
            kills: BTreeMap::new(),
            spawner,
            zone: ZoneController::new(config.zone.clone()),
            effects: TimedEffects::new(),
            winner: None,
            pending_events: Vec::new(),
        }
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(id)
    }

    /// Display name of a roster member.
    pub fn player_name(&self, id: &PlayerId) -> Option<&str> {
        self.players.get(id).map(|p| p.name.as_str())
    }

    /// Number of roster members.
    pub fn roster_size(&self) -> u32 {
        self.players.len() as u32
    }

    /// Count of players still alive.
    pub fn alive_count(&self) -> u32 {
        self.players.values().filter(|p| p.alive).count() as u32
    }

    /// Kills credited to a player.
    pub fn kills_of(&self, id: &PlayerId) -> u32 {
        self.kills.get(id).copied().unwrap_or(0)
    }

    /// Is the match in active gameplay?
    pub fn is_playing(&self) -> bool {
        self.phase == MatchPhase::Playing
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng_seed, |hasher| {
            hasher.update_u32(self.round);
            hasher.update_u64(self.clock as u64);
            hasher.update_u8(self.phase as u8);
            hasher.update_fixed(self.phase_elapsed);

            // Players in sorted order (BTreeMap guarantees this)
            for player in self.players.values() {
                player.hash_into(hasher);
            }
            for (id, kills) in &self.kills {
                hasher.update_uuid(&id.0);
                hasher.update_u32(*kills);
            }

            self.spawner.hash_into(hasher);
            self.zone.hash_into(hasher);
            self.effects.hash_into(hasher);

            let [s0, s1] = self.rng.state();
            hasher.update_u64(s0);
            hasher.update_u64(s1);

            match self.winner {
                Some(id) => hasher.update_uuid(&id.0),
                None => hasher.update_u8(0),
            }
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

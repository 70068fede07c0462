//! Match Configuration
//!
//! Everything tunable about a match, loadable from a JSON file. Missing
//! fields take their defaults; decimals are converted to fixed-point once at
//! load time.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::info;

use crate::core::fixed::{Fixed, FIXED_ONE};
use crate::core::vec3::FixedVec3;
use crate::game::effects::EffectsConfig;
use crate::game::health::HealthConfig;
use crate::game::inventory::InventoryConfig;
use crate::game::loot::LootDefinition;
use crate::game::spawner::{LootSpawnPoint, LootSpawnerConfig};
use crate::game::state::GameMode;
use crate::game::zone::ZoneConfig;

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON for this schema
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Values are out of range or contradict each other
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Match tunables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Team mode; sets the roster minimum and the win threshold
    pub mode: GameMode,
    /// Roster cap
    pub max_players: u32,
    /// Seconds the lobby must hold a full roster before starting
    #[serde(with = "crate::core::fixed::as_float")]
    pub start_delay: Fixed,
    /// Seconds between "game starting" and "game started"
    #[serde(with = "crate::core::fixed::as_float")]
    pub countdown: Fixed,
    /// Seconds on the end screen before the roster resets
    #[serde(with = "crate::core::fixed::as_float")]
    pub end_delay: Fixed,
    /// Players spawn within this planar radius of a spawn point
    #[serde(with = "crate::core::fixed::as_float")]
    pub spawn_radius: Fixed,
    /// Player spawn points (raw Q16.16 components); empty means random map points
    pub spawn_points: Vec<FixedVec3>,
    /// Maximum planar distance between a player and loot they pick up
    #[serde(with = "crate::core::fixed::as_float")]
    pub pickup_radius: Fixed,
    /// Dropped items land this far in front of the player
    #[serde(with = "crate::core::fixed::as_float")]
    pub drop_distance: Fixed,
    /// Shrinking zone
    pub zone: ZoneConfig,
    /// Loot catalog; empty means the built-in catalog
    pub loot_catalog: Vec<LootDefinition>,
    /// Loot spawn points; empty means generated points
    pub loot_spawn_points: Vec<LootSpawnPoint>,
    /// Loot spawner tunables
    pub loot: LootSpawnerConfig,
    /// Inventory limits
    pub inventory: InventoryConfig,
    /// Health and armor
    pub health: HealthConfig,
    /// Timed effect durations
    pub effects: EffectsConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::Solo,
            max_players: 50,
            start_delay: 10 * FIXED_ONE,
            countdown: 5 * FIXED_ONE,
            end_delay: 5 * FIXED_ONE,
            spawn_radius: 50 * FIXED_ONE,
            spawn_points: Vec::new(),
            pickup_radius: 2 * FIXED_ONE,
            drop_distance: 2 * FIXED_ONE,
            zone: ZoneConfig::default(),
            loot_catalog: Vec::new(),
            loot_spawn_points: Vec::new(),
            loot: LootSpawnerConfig::default(),
            inventory: InventoryConfig::default(),
            health: HealthConfig::default(),
            effects: EffectsConfig::default(),
        }
    }
}

impl MatchConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        info!(path = %path.display(), mode = ?config.mode, "Loaded match config");
        Ok(config)
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges and cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players < self.mode.min_players() {
            return Err(ConfigError::Invalid(format!(
                "max_players {} is below the {:?} minimum of {}",
                self.max_players,
                self.mode,
                self.mode.min_players()
            )));
        }
        for (name, value) in [
            ("start_delay", self.start_delay),
            ("countdown", self.countdown),
            ("end_delay", self.end_delay),
            ("spawn_radius", self.spawn_radius),
            ("pickup_radius", self.pickup_radius),
            ("drop_distance", self.drop_distance),
        ] {
            if value < 0 {
                return Err(ConfigError::Invalid(format!("{} must not be negative", name)));
            }
        }
        if self.health.max_health <= 0 || self.health.revive_health <= 0 {
            return Err(ConfigError::Invalid("health values must be positive".into()));
        }
        if self.health.armor_absorption < 0 || self.health.armor_absorption > FIXED_ONE {
            return Err(ConfigError::Invalid("armor_absorption must be within [0, 1]".into()));
        }
        if self.loot.min_point_radius <= 0 || self.loot.max_point_radius < self.loot.min_point_radius {
            return Err(ConfigError::Invalid("loot point radius range is empty".into()));
        }
        if self.loot_catalog.iter().any(|d| d.spawn_weight < 0) {
            return Err(ConfigError::Invalid("loot spawn weights must not be negative".into()));
        }
        if self.effects.reload_time <= 0 {
            return Err(ConfigError::Invalid("reload_time must be positive".into()));
        }
        self.zone.validate()
    }
}

//! Persistent host settings.
//!
//! A small key→scalar store (audio levels, quality level) kept in a JSON file.
//! Every `set` writes the file back, so a crash never loses a change.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::ConfigError;

/// Master volume key
pub const MASTER_VOLUME: &str = "master_volume";
/// Music volume key
pub const MUSIC_VOLUME: &str = "music_volume";
/// Sound effects volume key
pub const SFX_VOLUME: &str = "sfx_volume";
/// Voice volume key
pub const VOICE_VOLUME: &str = "voice_volume";
/// Ambient volume key
pub const AMBIENT_VOLUME: &str = "ambient_volume";
/// Quality level key (0 = low, 1 = medium, 2 = high)
pub const QUALITY_LEVEL: &str = "quality_level";

const DEFAULTS: [(&str, f32); 6] = [
    (MASTER_VOLUME, 1.0),
    (MUSIC_VOLUME, 0.7),
    (SFX_VOLUME, 1.0),
    (VOICE_VOLUME, 0.8),
    (AMBIENT_VOLUME, 0.5),
    (QUALITY_LEVEL, 2.0),
];

/// Default for a known key.
pub fn default_value(key: &str) -> Option<f32> {
    DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn is_volume(key: &str) -> bool {
    key.ends_with("_volume")
}

/// Key→f32 settings, optionally backed by a file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, f32>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SettingsStore {
    /// Defaults only, never written anywhere.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: DEFAULTS.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    /// Load from `path`, or start from defaults when the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self::in_memory();

        if path.exists() {
            let text = fs::read_to_string(&path)?;
            let saved: BTreeMap<String, f32> = serde_json::from_str(&text)?;
            info!(path = %path.display(), keys = saved.len(), "Settings loaded");
            store.values.extend(saved);
        } else {
            debug!(path = %path.display(), "No settings file, using defaults");
        }

        store.path = Some(path);
        Ok(store)
    }

    /// Current value; unknown keys fall back to their default, then 0.
    pub fn get(&self, key: &str) -> f32 {
        self.values
            .get(key)
            .copied()
            .or_else(|| default_value(key))
            .unwrap_or(0.0)
    }

    /// Store a value and save. Volumes are clamped to [0, 1].
    pub fn set(&mut self, key: &str, value: f32) -> Result<(), ConfigError> {
        if !value.is_finite() {
            return Err(ConfigError::Invalid(format!("{} must be finite", key)));
        }
        let value = if is_volume(key) { value.clamp(0.0, 1.0) } else { value };
        self.values.insert(key.to_string(), value);
        self.save()
    }

    /// Restore every default and save.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        let path = self.path.take();
        *self = Self::in_memory();
        self.path = path;
        self.save()
    }

    /// Write the file, if there is one.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&self.values)?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    /// All keys and values in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Effective level for a channel (channel × master).
    pub fn effective_volume(&self, key: &str) -> f32 {
        self.get(key) * self.get(MASTER_VOLUME)
    }
}

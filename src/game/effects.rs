//! Timed Effects
//!
//! Short time-based side sequences (reloads, camera shake, music fades)
//! advanced by the match tick. They never touch gameplay state; completing
//! one only produces an event.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::fixed::{Fixed, FIXED_ONE, fixed_clamp, fixed_div, to_fixed};
use crate::core::hash::StateHasher;
use crate::game::state::PlayerId;

/// Rejected effect requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    /// The player already has a reload in flight
    #[error("reload already in progress")]
    ReloadInProgress,

    /// Durations must be positive
    #[error("effect duration must be positive")]
    InvalidDuration,
}

/// Effect durations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Seconds a reload takes
    #[serde(with = "crate::core::fixed::as_float")]
    pub reload_time: Fixed,
    /// Seconds a damage shake lasts
    #[serde(with = "crate::core::fixed::as_float")]
    pub shake_duration: Fixed,
    /// Damage shake magnitude
    #[serde(with = "crate::core::fixed::as_float")]
    pub shake_magnitude: Fixed,
    /// Seconds a music crossfade takes
    #[serde(with = "crate::core::fixed::as_float")]
    pub music_fade_time: Fixed,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            reload_time: 2 * FIXED_ONE,
            shake_duration: to_fixed(0.2),
            shake_magnitude: to_fixed(0.1),
            music_fade_time: FIXED_ONE,
        }
    }
}

/// What an effect does when it finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Weapon reload for a weapon slot
    Reload {
        /// Weapon slot being reloaded
        slot: u8,
    },
    /// Camera shake after a hit
    ScreenShake {
        /// Shake magnitude
        magnitude: Fixed,
    },
    /// Music volume ramp
    MusicFade {
        /// Volume at the end of the fade
        target_volume: Fixed,
    },
}

impl EffectKind {
    fn tag(self) -> u8 {
        match self {
            EffectKind::Reload { .. } => 0,
            EffectKind::ScreenShake { .. } => 1,
            EffectKind::MusicFade { .. } => 2,
        }
    }
}

/// One in-flight effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEffect {
    /// Effect id
    pub id: u32,
    /// Player the effect belongs to; `None` for match-wide effects
    pub owner: Option<PlayerId>,
    /// Behaviour
    pub kind: EffectKind,
    /// Seconds left
    pub remaining: Fixed,
    /// Length in seconds
    pub duration: Fixed,
}

/// Scheduler for in-flight effects.
///
/// Each effect counts its own time down, so there is no shared clock that
/// can run out of range on a long-lived host.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimedEffects {
    tasks: BTreeMap<u32, TimedEffect>,
    next_id: u32,
}

impl TimedEffects {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an effect. Returns its id.
    pub fn start(&mut self, owner: Option<PlayerId>, kind: EffectKind, duration: Fixed) -> Result<u32, EffectError> {
        if duration <= 0 {
            return Err(EffectError::InvalidDuration);
        }
        if let (Some(player), EffectKind::Reload { .. }) = (owner, kind) {
            if self.is_reloading(&player) {
                return Err(EffectError::ReloadInProgress);
            }
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.tasks.insert(
            id,
            TimedEffect {
                id,
                owner,
                kind,
                remaining: duration,
                duration,
            },
        );
        Ok(id)
    }

    /// Advance by `delta` seconds and return effects that completed, in id order.
    pub fn tick(&mut self, delta: Fixed) -> Vec<TimedEffect> {
        let mut done = Vec::new();
        for task in self.tasks.values_mut() {
            task.remaining = task.remaining.saturating_sub(delta);
            if task.remaining <= 0 {
                done.push(task.id);
            }
        }
        done.into_iter().filter_map(|id| self.tasks.remove(&id)).collect()
    }

    /// Abort every effect owned by `owner` without completing it.
    pub fn cancel_owned_by(&mut self, owner: &PlayerId) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, t| t.owner.as_ref() != Some(owner));
        before - self.tasks.len()
    }

    /// Abort one effect.
    pub fn cancel(&mut self, id: u32) -> bool {
        self.tasks.remove(&id).is_some()
    }

    /// Abort everything.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Does the player have a reload in flight?
    pub fn is_reloading(&self, player: &PlayerId) -> bool {
        self.tasks
            .values()
            .any(|t| t.owner.as_ref() == Some(player) && matches!(t.kind, EffectKind::Reload { .. }))
    }

    /// Completion fraction of an effect, in [0, 1].
    pub fn progress(&self, id: u32) -> Option<Fixed> {
        self.tasks.get(&id).map(|t| {
            let elapsed = t.duration.saturating_sub(t.remaining.max(0));
            fixed_clamp(fixed_div(elapsed, t.duration), 0, FIXED_ONE)
        })
    }

    /// Number of in-flight effects.
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    /// Hash in-flight effects for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.next_id);
        for task in self.tasks.values() {
            hasher.update_u32(task.id);
            hasher.update_u8(task.kind.tag());
            hasher.update_fixed(task.remaining);
            hasher.update_fixed(task.duration);
        }
    }
}

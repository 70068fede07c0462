//! Shrinking Safe Zone
//!
//! Phased state machine: each phase waits, then shrinks the circle toward
//! the phase radius, then settles. The circle is centered on the world
//! origin and membership is measured on the ground plane.
//!
//! ```text
//!   ┌─────────┐ wait elapsed ┌────────┐ shrink done ┌────────┐
//!   │ Waiting │─────────────►│ Moving │────────────►│ Stable │
//!   └─────────┘              └────────┘             └────────┘
//!        ▲                                               │
//!        └──────────────── phases remain ────────────────┘
//! ```

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::core::fixed::{Fixed, FIXED_ONE, fixed_clamp, fixed_div, fixed_lerp, fixed_mul};
use crate::core::hash::StateHasher;
use crate::core::vec3::FixedVec3;
use crate::game::state::PlayerId;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Display color of a phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneColor {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl ZoneColor {
    /// Phase 1
    pub const BLUE: Self = Self { r: 0, g: 0, b: 255 };
    /// Phase 2
    pub const YELLOW: Self = Self { r: 255, g: 235, b: 4 };
    /// Phase 3
    pub const ORANGE: Self = Self { r: 255, g: 165, b: 0 };
    /// Late phases
    pub const RED: Self = Self { r: 255, g: 0, b: 0 };
}

/// One shrink step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonePhase {
    /// Radius at the end of this phase
    #[serde(with = "crate::core::fixed::as_float")]
    pub radius: Fixed,
    /// Seconds before shrinking starts
    #[serde(with = "crate::core::fixed::as_float")]
    pub wait_time: Fixed,
    /// Seconds the shrink takes
    #[serde(with = "crate::core::fixed::as_float")]
    pub shrink_time: Fixed,
    /// Display color
    pub color: ZoneColor,
}

impl ZonePhase {
    /// Phase from whole-unit values.
    pub const fn new(radius: i32, wait_time: i32, shrink_time: i32, color: ZoneColor) -> Self {
        Self {
            radius: radius * FIXED_ONE,
            wait_time: wait_time * FIXED_ONE,
            shrink_time: shrink_time * FIXED_ONE,
            color,
        }
    }
}

/// Zone tunables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Radius before the first phase
    #[serde(with = "crate::core::fixed::as_float")]
    pub initial_radius: Fixed,
    /// Damage per second outside the circle
    #[serde(with = "crate::core::fixed::as_float")]
    pub damage_per_second: Fixed,
    /// Ordered phases; empty means the default table
    pub phases: Vec<ZonePhase>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            initial_radius: 200 * FIXED_ONE,
            damage_per_second: 10 * FIXED_ONE,
            phases: default_phases(),
        }
    }
}

/// The built-in seven-phase table.
pub fn default_phases() -> Vec<ZonePhase> {
    vec![
        ZonePhase::new(150, 60, 30, ZoneColor::BLUE),
        ZonePhase::new(100, 45, 25, ZoneColor::YELLOW),
        ZonePhase::new(70, 30, 20, ZoneColor::ORANGE),
        ZonePhase::new(50, 20, 15, ZoneColor::RED),
        ZonePhase::new(30, 15, 10, ZoneColor::RED),
        ZonePhase::new(15, 10, 5, ZoneColor::RED),
        ZonePhase::new(8, 5, 3, ZoneColor::RED),
    ]
}

impl ZoneConfig {
    /// Reject tables that could grow the circle or stall a shrink.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_radius <= 0 {
            return Err(ConfigError::Invalid("zone initial radius must be positive".into()));
        }
        if self.damage_per_second < 0 {
            return Err(ConfigError::Invalid("zone damage must not be negative".into()));
        }
        let mut previous = self.initial_radius;
        for (index, phase) in self.phases.iter().enumerate() {
            if phase.radius > previous {
                return Err(ConfigError::Invalid(format!(
                    "zone phase {} radius grows the circle",
                    index
                )));
            }
            if phase.radius < 0 || phase.wait_time < 0 {
                return Err(ConfigError::Invalid(format!(
                    "zone phase {} has a negative value",
                    index
                )));
            }
            if phase.shrink_time <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "zone phase {} shrink time must be positive",
                    index
                )));
            }
            previous = phase.radius;
        }
        Ok(())
    }
}

// =============================================================================
// RUNTIME
// =============================================================================

/// Where the controller is within the current phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ZoneState {
    /// Counting down to the next shrink
    #[default]
    Waiting = 0,
    /// Shrinking
    Moving = 1,
    /// Shrink finished
    Stable = 2,
}

/// Discrete zone notifications produced by `tick`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneSignal {
    /// Shrink warning turned on or off
    Warning {
        /// Warning visible
        active: bool,
        /// Phase index the warning belongs to
        phase: u32,
    },
    /// A phase finished shrinking
    PhaseCompleted {
        /// Completed phase index
        phase: u32,
        /// New radius
        radius: Fixed,
    },
}

/// Danger-membership edge for one player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DangerTransition {
    /// Went outside the circle
    Entered,
    /// Came back inside
    Left,
}

/// Zone state machine plus per-player danger tracking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneController {
    config: ZoneConfig,
    current_radius: Fixed,
    start_radius: Fixed,
    target_radius: Fixed,
    phase_index: usize,
    phase_elapsed: Fixed,
    state: ZoneState,
    finished: bool,
    in_danger: BTreeSet<PlayerId>,
}

impl ZoneController {
    /// Build a controller. An empty phase list uses the default table.
    pub fn new(mut config: ZoneConfig) -> Self {
        if config.phases.is_empty() {
            info!("No zone phases configured, using default table");
            config.phases = default_phases();
        }
        let radius = config.initial_radius;
        Self {
            config,
            current_radius: radius,
            start_radius: radius,
            target_radius: radius,
            phase_index: 0,
            phase_elapsed: 0,
            state: ZoneState::Waiting,
            finished: false,
            in_danger: BTreeSet::new(),
        }
    }

    /// Back to the full circle at phase zero.
    pub fn reset(&mut self) {
        let radius = self.config.initial_radius;
        self.current_radius = radius;
        self.start_radius = radius;
        self.target_radius = radius;
        self.phase_index = 0;
        self.phase_elapsed = 0;
        self.state = ZoneState::Waiting;
        self.finished = false;
        self.in_danger.clear();
    }

    /// Advance by `delta` seconds.
    pub fn tick(&mut self, delta: Fixed) -> Vec<ZoneSignal> {
        let mut signals = Vec::new();
        if self.finished {
            return signals;
        }
        let Some(phase) = self.config.phases.get(self.phase_index) else {
            self.finished = true;
            return signals;
        };
        let (phase_radius, wait_time, shrink_time) = (phase.radius, phase.wait_time, phase.shrink_time);

        self.phase_elapsed = self.phase_elapsed.saturating_add(delta);

        match self.state {
            ZoneState::Waiting => {
                if self.phase_elapsed >= wait_time {
                    self.state = ZoneState::Moving;
                    self.phase_elapsed = 0;
                    self.start_radius = self.current_radius;
                    self.target_radius = phase_radius.min(self.current_radius);
                    debug!(phase = self.phase_index, "Zone shrinking");
                    signals.push(ZoneSignal::Warning { active: true, phase: self.phase_index as u32 });
                }
            }
            ZoneState::Moving => {
                let ratio = fixed_clamp(fixed_div(self.phase_elapsed, shrink_time), 0, FIXED_ONE);
                self.current_radius = fixed_lerp(self.start_radius, self.target_radius, ratio);
                if ratio >= FIXED_ONE {
                    let completed = self.phase_index as u32;
                    self.current_radius = self.target_radius;
                    self.phase_index += 1;
                    self.phase_elapsed = 0;
                    self.state = ZoneState::Stable;
                    debug!(phase = completed, radius = ?crate::core::fixed::to_float(self.current_radius), "Zone phase completed");
                    signals.push(ZoneSignal::Warning { active: false, phase: completed });
                    signals.push(ZoneSignal::PhaseCompleted { phase: completed, radius: self.current_radius });
                }
            }
            ZoneState::Stable => {
                if self.phase_index < self.config.phases.len() {
                    self.state = ZoneState::Waiting;
                    self.phase_elapsed = 0;
                } else {
                    self.finished = true;
                }
            }
        }
        signals
    }

    /// Is `position` inside the safe circle?
    pub fn is_safe(&self, position: FixedVec3) -> bool {
        FixedVec3::ZERO.within_planar(position, self.current_radius)
    }

    /// Record a player's position and report a danger edge, if any.
    pub fn update_membership(&mut self, player: PlayerId, position: FixedVec3) -> Option<DangerTransition> {
        let safe = self.is_safe(position);
        let was_in_danger = self.in_danger.contains(&player);
        match (was_in_danger, safe) {
            (false, false) => {
                self.in_danger.insert(player);
                Some(DangerTransition::Entered)
            }
            (true, true) => {
                self.in_danger.remove(&player);
                Some(DangerTransition::Left)
            }
            _ => None,
        }
    }

    /// Stop tracking a player.
    pub fn forget(&mut self, player: &PlayerId) {
        self.in_danger.remove(player);
    }

    /// Is the player currently flagged as outside?
    pub fn is_in_danger(&self, player: &PlayerId) -> bool {
        self.in_danger.contains(player)
    }

    /// Damage dealt to an outside player over `delta` seconds.
    pub fn damage_for(&self, delta: Fixed) -> Fixed {
        fixed_mul(self.config.damage_per_second, delta)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current radius.
    pub fn current_radius(&self) -> Fixed {
        self.current_radius
    }

    /// Radius the active shrink is heading to.
    pub fn target_radius(&self) -> Fixed {
        self.target_radius
    }

    /// Index of the phase in progress.
    pub fn phase_index(&self) -> usize {
        self.phase_index
    }

    /// The phase in progress, if any remain.
    pub fn current_phase(&self) -> Option<&ZonePhase> {
        self.config.phases.get(self.phase_index)
    }

    /// Machine state.
    pub fn state(&self) -> ZoneState {
        self.state
    }

    /// Every phase has run.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Seconds left in the current wait or shrink.
    pub fn time_until_next_phase(&self) -> Fixed {
        match (self.state, self.current_phase()) {
            (ZoneState::Waiting, Some(phase)) => (phase.wait_time - self.phase_elapsed).max(0),
            (ZoneState::Moving, Some(phase)) => (phase.shrink_time - self.phase_elapsed).max(0),
            _ => 0,
        }
    }

    /// Planar distance from `position` to the circle edge. Negative inside.
    pub fn distance_to_edge(&self, position: FixedVec3) -> Fixed {
        FixedVec3::ZERO.planar_distance(position) - self.current_radius
    }

    /// Completed phases as a fraction of all phases.
    pub fn phase_progress(&self) -> Fixed {
        let total = self.config.phases.len() as i32;
        if total == 0 {
            return FIXED_ONE;
        }
        (self.phase_index as i32 * FIXED_ONE) / total
    }

    /// Tunables in use.
    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Hash runtime state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_fixed(self.current_radius);
        hasher.update_fixed(self.start_radius);
        hasher.update_fixed(self.target_radius);
        hasher.update_u32(self.phase_index as u32);
        hasher.update_fixed(self.phase_elapsed);
        hasher.update_u8(self.state as u8);
        hasher.update_bool(self.finished);
        for id in &self.in_danger {
            hasher.update_uuid(id.as_bytes());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

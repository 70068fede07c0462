//! Health and Damage
//!
//! Armor absorbs half of every hit up to its remaining value; the rest goes
//! to health. Reaching zero health kills, and only `revive` brings a player
//! back.

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, FIXED_HALF, FIXED_ONE, fixed_mul};
use crate::core::hash::StateHasher;
use crate::game::state::PlayerId;

/// Tunables for the health model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Maximum health
    #[serde(with = "crate::core::fixed::as_float")]
    pub max_health: Fixed,
    /// Maximum armor
    #[serde(with = "crate::core::fixed::as_float")]
    pub max_armor: Fixed,
    /// Fraction of each hit that armor may absorb
    #[serde(with = "crate::core::fixed::as_float")]
    pub armor_absorption: Fixed,
    /// Passive regeneration toggle
    pub regen_enabled: bool,
    /// Health regenerated per second
    #[serde(with = "crate::core::fixed::as_float")]
    pub regen_rate: Fixed,
    /// Seconds without damage before regeneration kicks in
    #[serde(with = "crate::core::fixed::as_float")]
    pub regen_delay: Fixed,
    /// Health granted by a plain revive
    #[serde(with = "crate::core::fixed::as_float")]
    pub revive_health: Fixed,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_health: 100 * FIXED_ONE,
            max_armor: 100 * FIXED_ONE,
            armor_absorption: FIXED_HALF,
            regen_enabled: false,
            regen_rate: 5 * FIXED_ONE,
            regen_delay: 5 * FIXED_ONE,
            revive_health: 50 * FIXED_ONE,
        }
    }
}

/// What caused a hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageSource {
    /// Another player (or the victim themselves)
    Player(PlayerId),
    /// Standing outside the safe zone
    Zone,
    /// Falling
    Fall,
}

impl DamageSource {
    /// Attacking player, if any.
    pub fn attacker(self) -> Option<PlayerId> {
        match self {
            DamageSource::Player(id) => Some(id),
            DamageSource::Zone | DamageSource::Fall => None,
        }
    }
}

/// Result of a hit that landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DamageOutcome {
    /// Damage soaked by armor
    pub absorbed: Fixed,
    /// Damage taken from health
    pub dealt: Fixed,
    /// This hit killed the player
    pub killed: bool,
}

/// Per-player health, armor and capability flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    /// Current health, in [0, max_health]
    pub health: Fixed,
    /// Health ceiling
    pub max_health: Fixed,
    /// Current armor, in [0, max_armor]
    pub armor: Fixed,
    /// Armor ceiling
    pub max_armor: Fixed,
    /// Dead until revived
    pub dead: bool,
    /// Match clock of the last hit taken (widened Q16.16 seconds)
    pub last_damage_time: Option<i64>,
    /// Movement allowed
    pub can_move: bool,
    /// Weapon use allowed
    pub can_use_weapons: bool,
}

impl HealthState {
    /// Full health, no armor.
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            health: config.max_health,
            max_health: config.max_health,
            armor: 0,
            max_armor: config.max_armor,
            dead: false,
            last_damage_time: None,
            can_move: true,
            can_use_weapons: true,
        }
    }

    /// Is the player alive?
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Apply a hit at match time `now`.
    ///
    /// Returns `None` when the player is already dead or the amount is not
    /// positive.
    pub fn take_damage(&mut self, amount: Fixed, config: &HealthConfig, now: i64) -> Option<DamageOutcome> {
        if self.dead || amount <= 0 {
            return None;
        }
        self.last_damage_time = Some(now);

        let absorbed = self.armor.min(fixed_mul(amount, config.armor_absorption));
        self.armor -= absorbed;

        let dealt = (amount - absorbed).min(self.health);
        self.health -= dealt;

        let killed = self.health == 0 && self.die();
        Some(DamageOutcome { absorbed, dealt, killed })
    }

    /// Kill the player. Returns `false` if they were already dead.
    pub fn die(&mut self) -> bool {
        if self.dead {
            return false;
        }
        self.dead = true;
        self.health = 0;
        self.can_move = false;
        self.can_use_weapons = false;
        true
    }

    /// Restore health. Returns the amount actually healed.
    pub fn heal(&mut self, amount: Fixed) -> Fixed {
        if self.dead || amount <= 0 {
            return 0;
        }
        let before = self.health;
        self.health = self.health.saturating_add(amount).min(self.max_health);
        self.health - before
    }

    /// Add armor. Returns the amount actually added.
    pub fn add_armor(&mut self, amount: Fixed) -> Fixed {
        if self.dead || amount <= 0 {
            return 0;
        }
        let before = self.armor;
        self.armor = self.armor.saturating_add(amount).min(self.max_armor);
        self.armor - before
    }

    /// Bring a dead player back with `amount` health.
    ///
    /// No-op on the living. A non-positive amount still revives with the
    /// smallest representable health so the dead flag and health agree.
    pub fn revive(&mut self, amount: Fixed) -> bool {
        if !self.dead {
            return false;
        }
        self.dead = false;
        self.health = amount.clamp(1, self.max_health);
        self.can_move = true;
        self.can_use_weapons = true;
        true
    }

    /// Passive regeneration for one tick. Returns the amount healed.
    pub fn regenerate(&mut self, config: &HealthConfig, now: i64, delta: Fixed) -> Fixed {
        if !config.regen_enabled || self.dead || self.health >= self.max_health {
            return 0;
        }
        let quiet_for = self
            .last_damage_time
            .map(|t| now.saturating_sub(t))
            .unwrap_or(i64::MAX);
        if quiet_for <= i64::from(config.regen_delay) {
            return 0;
        }
        self.heal(fixed_mul(config.regen_rate, delta))
    }

    /// Health as a fraction of the maximum.
    pub fn health_fraction(&self) -> Fixed {
        crate::core::fixed::fixed_div(self.health, self.max_health)
    }

    /// Back to a fresh state: alive, full health, no armor.
    pub fn reset(&mut self) {
        self.health = self.max_health;
        self.armor = 0;
        self.dead = false;
        self.last_damage_time = None;
        self.can_move = true;
        self.can_use_weapons = true;
    }

    /// Hash this state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_fixed(self.health);
        hasher.update_fixed(self.armor);
        hasher.update_bool(self.dead);
        hasher.update_u64(self.last_damage_time.unwrap_or(-1) as u64);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;
    use proptest::prelude::*;

    fn fresh() -> (HealthState, HealthConfig) {
        let config = HealthConfig::default();
        (HealthState::new(&config), config)
    }

    #[test]
    fn test_armor_absorbs_half() {
        let (mut hp, config) = fresh();
        hp.add_armor(to_fixed(50.0));

        let outcome = hp.take_damage(to_fixed(40.0), &config, 0).unwrap();
        assert_eq!(outcome.absorbed, to_fixed(20.0));
        assert_eq!(outcome.dealt, to_fixed(20.0));
        assert_eq!(hp.armor, to_fixed(30.0));
        assert_eq!(hp.health, to_fixed(80.0));
        assert!(!outcome.killed);
    }

    #[test]
    fn test_armor_exhausted() {
        let (mut hp, config) = fresh();
        hp.add_armor(to_fixed(5.0));

        hp.take_damage(to_fixed(40.0), &config, 0);
        assert_eq!(hp.armor, 0);
        assert_eq!(hp.health, to_fixed(65.0));
    }

    #[test]
    fn test_lethal_damage_kills_once() {
        let (mut hp, config) = fresh();
        let outcome = hp.take_damage(to_fixed(250.0), &config, 0).unwrap();
        assert!(outcome.killed);
        assert!(hp.dead);
        assert_eq!(hp.health, 0);
        assert!(!hp.can_move && !hp.can_use_weapons);

        // Dead players ignore further hits
        assert!(hp.take_damage(to_fixed(10.0), &config, 0).is_none());
    }

    #[test]
    fn test_die_is_idempotent() {
        let (mut hp, _) = fresh();
        assert!(hp.die());
        let snapshot = hp.clone();
        assert!(!hp.die());
        assert_eq!(hp, snapshot);
    }

    #[test]
    fn test_heal_and_armor_clamp() {
        let (mut hp, config) = fresh();
        hp.take_damage(to_fixed(30.0), &config, 0);
        assert_eq!(hp.heal(to_fixed(75.0)), to_fixed(30.0));
        assert_eq!(hp.health, hp.max_health);

        assert_eq!(hp.add_armor(to_fixed(75.0)), to_fixed(75.0));
        assert_eq!(hp.add_armor(to_fixed(75.0)), to_fixed(25.0));
        assert_eq!(hp.armor, hp.max_armor);
    }

    #[test]
    fn test_dead_cannot_heal() {
        let (mut hp, _) = fresh();
        hp.die();
        assert_eq!(hp.heal(to_fixed(20.0)), 0);
        assert_eq!(hp.add_armor(to_fixed(20.0)), 0);
        assert_eq!(hp.health, 0);
    }

    #[test]
    fn test_revive() {
        let (mut hp, config) = fresh();
        assert!(!hp.revive(config.revive_health), "living players are not revived");

        hp.die();
        assert!(hp.revive(config.revive_health));
        assert!(!hp.dead);
        assert_eq!(hp.health, to_fixed(50.0));
        assert!(hp.can_move && hp.can_use_weapons);

        hp.die();
        hp.revive(to_fixed(500.0));
        assert_eq!(hp.health, hp.max_health);
    }

    #[test]
    fn test_regeneration_waits_for_delay() {
        let config = HealthConfig { regen_enabled: true, ..HealthConfig::default() };
        let mut hp = HealthState::new(&config);
        hp.take_damage(to_fixed(50.0), &config, 0);

        // Inside the delay window
        assert_eq!(hp.regenerate(&config, i64::from(to_fixed(4.0)), FIXED_ONE), 0);
        // Past it: 5 per second
        assert_eq!(hp.regenerate(&config, i64::from(to_fixed(6.0)), FIXED_ONE), to_fixed(5.0));
        assert_eq!(hp.health, to_fixed(55.0));
    }

    #[test]
    fn test_regeneration_disabled_by_default() {
        let (mut hp, config) = fresh();
        hp.take_damage(to_fixed(50.0), &config, 0);
        assert_eq!(hp.regenerate(&config, i64::from(to_fixed(60.0)), FIXED_ONE), 0);
    }

    #[test]
    fn test_regeneration_after_long_uptime() {
        let config = HealthConfig { regen_enabled: true, ..HealthConfig::default() };
        let mut hp = HealthState::new(&config);
        // Ten hours in, beyond what an i32 Q16.16 clock can hold.
        let now = 36_000 * i64::from(FIXED_ONE);
        hp.take_damage(to_fixed(50.0), &config, now);

        assert_eq!(hp.regenerate(&config, now + i64::from(to_fixed(4.0)), FIXED_ONE), 0);
        assert_eq!(hp.regenerate(&config, now + i64::from(to_fixed(6.0)), FIXED_ONE), to_fixed(5.0));
    }

    proptest! {
        #[test]
        fn prop_armor_absorption(armor in 0i32..=100, damage in 1i32..=200) {
            let config = HealthConfig::default();
            let mut hp = HealthState::new(&config);
            hp.add_armor(armor * FIXED_ONE);
            prop_assume!(damage <= armor * 2);

            let d = damage * FIXED_ONE;
            let armor_before = hp.armor;
            let health_before = hp.health;
            hp.take_damage(d, &config, 0);

            let absorbed = armor_before.min(d / 2);
            prop_assert_eq!(hp.armor, armor_before - absorbed);
            prop_assert_eq!(hp.health, (health_before - (d - absorbed)).max(0));
            prop_assert!(hp.health >= 0);
        }

        #[test]
        fn prop_health_stays_in_range(hits in proptest::collection::vec(0i32..=80, 0..20)) {
            let config = HealthConfig::default();
            let mut hp = HealthState::new(&config);
            for hit in hits {
                hp.take_damage(hit * FIXED_ONE, &config, 0);
                prop_assert!(hp.health >= 0 && hp.health <= hp.max_health);
                prop_assert_eq!(hp.dead, hp.health == 0);
            }
        }
    }
}

//! Loot Spawning and Pickup
//!
//! Deterministic weighted placement of catalog items onto spawn points.
//! All randomness comes from the match RNG, so the same seed lays out the
//! same loot.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::fixed::{Fixed, FIXED_ONE, MAP_HALF_EXTENT, to_fixed};
use crate::core::hash::StateHasher;
use crate::core::rng::DeterministicRng;
use crate::core::vec3::FixedVec3;
use crate::game::inventory::{Inventory, InventoryError, ItemKey};
use crate::game::loot::{LootCatalog, LootCategory, LootDefinition};
use crate::game::world::GroundQuery;

// =============================================================================
// ERRORS
// =============================================================================

/// Rejected pickup or drop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickupError {
    /// No such instance in the world (never spawned or already taken)
    #[error("loot {0} not found")]
    NotFound(u32),

    /// The player is too far from the instance
    #[error("loot {0} out of reach")]
    OutOfReach(u32),

    /// Item has no catalog entry
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// The inventory refused the item
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Spawner tunables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootSpawnerConfig {
    /// Soft target for the initial spawn
    pub total_loot_items: u32,
    /// Points to generate when none are given
    pub random_spawn_point_count: u32,
    /// Generated points lie within ± this on X and Z
    #[serde(with = "crate::core::fixed::as_float")]
    pub map_half_extent: Fixed,
    /// Height above the ground hit for generated points
    #[serde(with = "crate::core::fixed::as_float")]
    pub spawn_height: Fixed,
    /// Chance that a generated point is high-value
    #[serde(with = "crate::core::fixed::as_float")]
    pub high_value_chance: Fixed,
    /// Ticket multiplier for high-value items at high-value points
    pub high_value_multiplier: u32,
    /// Smallest generated point radius (inclusive)
    #[serde(with = "crate::core::fixed::as_float")]
    pub min_point_radius: Fixed,
    /// Largest generated point radius (exclusive)
    #[serde(with = "crate::core::fixed::as_float")]
    pub max_point_radius: Fixed,
    /// Generated points hold between 1 and this many items
    pub max_items_per_point: u32,
}

impl Default for LootSpawnerConfig {
    fn default() -> Self {
        Self {
            total_loot_items: 200,
            random_spawn_point_count: 150,
            map_half_extent: MAP_HALF_EXTENT,
            spawn_height: to_fixed(0.5),
            high_value_chance: to_fixed(0.1),
            high_value_multiplier: 2,
            min_point_radius: FIXED_ONE,
            max_point_radius: 3 * FIXED_ONE,
            max_items_per_point: 3,
        }
    }
}

// =============================================================================
// SPAWN POINTS AND INSTANCES
// =============================================================================

/// A place loot may appear.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootSpawnPoint {
    /// Center
    pub position: FixedVec3,
    /// Items land within this planar radius
    #[serde(with = "crate::core::fixed::as_float")]
    pub radius: Fixed,
    /// Categories this point may hold
    pub allowed: BTreeSet<LootCategory>,
    /// Maximum concurrent items within the radius
    pub max_items: u32,
    /// Favors high-value items
    #[serde(default)]
    pub high_value: bool,
}

impl LootSpawnPoint {
    /// Point allowing every category.
    pub fn new(position: FixedVec3, radius: Fixed, max_items: u32) -> Self {
        Self {
            position,
            radius,
            allowed: LootCategory::ALL.into_iter().collect(),
            max_items,
            high_value: false,
        }
    }

    /// Restrict to the given categories.
    pub fn with_categories(mut self, categories: impl IntoIterator<Item = LootCategory>) -> Self {
        self.allowed = categories.into_iter().collect();
        self
    }

    /// Mark as high-value.
    pub fn with_high_value(mut self, high_value: bool) -> Self {
        self.high_value = high_value;
        self
    }
}

/// An item lying in the world. Taking it removes it from the spawner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnedLootInstance {
    /// Monotonic id
    pub id: u32,
    /// Catalog index
    pub definition: usize,
    /// Units in this instance
    pub quantity: u32,
    /// World position
    pub position: FixedVec3,
}

/// What a successful pickup moved into the inventory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickedUpLoot {
    /// Instance id
    pub id: u32,
    /// Item name
    pub name: String,
    /// Item family
    pub category: LootCategory,
    /// Units taken
    pub quantity: u32,
}

// =============================================================================
// SPAWNER
// =============================================================================

/// Owns the catalog, the spawn points and every live instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LootSpawner {
    catalog: LootCatalog,
    points: Vec<LootSpawnPoint>,
    instances: BTreeMap<u32, SpawnedLootInstance>,
    next_id: u32,
    config: LootSpawnerConfig,
}

impl LootSpawner {
    /// Build a spawner.
    ///
    /// An empty catalog falls back to the default catalog and an empty point
    /// list is replaced by generated points.
    pub fn new(
        catalog: Vec<LootDefinition>,
        points: Vec<LootSpawnPoint>,
        config: LootSpawnerConfig,
        rng: &mut DeterministicRng,
        ground: &dyn GroundQuery,
    ) -> Self {
        let catalog = LootCatalog::or_default(catalog);
        let points = if points.is_empty() {
            let generated = generate_spawn_points(&config, rng, ground);
            info!(count = generated.len(), "Generated loot spawn points");
            generated
        } else {
            points
        };
        Self {
            catalog,
            points,
            instances: BTreeMap::new(),
            next_id: 0,
            config,
        }
    }

    /// Fill the world up to `total_loot_items`. Returns the number placed.
    ///
    /// Rejection sampling over random points, capped at twice the target in
    /// attempts, so the target is a ceiling rather than a promise.
    pub fn spawn_initial(&mut self, rng: &mut DeterministicRng) -> u32 {
        let target = self.config.total_loot_items;
        let max_attempts = target.saturating_mul(2);
        let mut spawned = 0;
        let mut attempts = 0;

        if self.points.is_empty() || self.catalog.is_empty() {
            return 0;
        }

        while spawned < target && attempts < max_attempts {
            attempts += 1;

            let point_index = rng.next_int(self.points.len() as u32) as usize;
            let Some(point) = self.points.get(point_index) else {
                continue;
            };
            if self.count_near(point.position, point.radius) >= point.max_items as usize {
                continue;
            }

            let tickets = self.tickets_for(point);
            let Some(definition) = rng.weighted_index(&tickets) else {
                continue;
            };

            let (dx, dz) = rng.random_offset_in_disc(point.radius);
            let position = FixedVec3::new(
                point.position.x.saturating_add(dx),
                point.position.y,
                point.position.z.saturating_add(dz),
            );
            let quantity = self.catalog.get(definition).map(|d| d.base_quantity).unwrap_or(1);
            self.insert(definition, quantity, position);
            spawned += 1;
        }

        info!(spawned, attempts, points = self.points.len(), "Initial loot spawned");
        spawned
    }

    /// Remove everything and spawn again.
    pub fn respawn_all(&mut self, rng: &mut DeterministicRng) -> u32 {
        self.clear();
        self.spawn_initial(rng)
    }

    /// Remove every instance.
    pub fn clear(&mut self) {
        self.instances.clear();
    }

    /// Move an instance into `inventory`.
    ///
    /// The instance leaves the world only if the inventory accepted it, and
    /// it can leave at most once.
    pub fn pickup_into(&mut self, id: u32, inventory: &mut Inventory) -> Result<PickedUpLoot, PickupError> {
        let instance = self
            .instances
            .get(&id)
            .ok_or(PickupError::NotFound(id))?;
        let definition = self
            .catalog
            .get(instance.definition)
            .ok_or(PickupError::NotFound(id))?;

        inventory.pickup(&definition.name, definition.category, instance.quantity)?;

        let picked = PickedUpLoot {
            id,
            name: definition.name.clone(),
            category: definition.category,
            quantity: instance.quantity,
        };
        self.instances.remove(&id);
        debug!(id, item = %picked.name, "Loot picked up");
        Ok(picked)
    }

    /// Put an item back into the world. Returns the new instance id.
    pub fn drop_into_world(&mut self, key: &ItemKey, quantity: u32, position: FixedVec3) -> Result<u32, PickupError> {
        let definition = self
            .catalog
            .find(&key.name, key.category)
            .ok_or_else(|| PickupError::UnknownItem(key.name.clone()))?;
        Ok(self.insert(definition, quantity, position))
    }

    fn insert(&mut self, definition: usize, quantity: u32, position: FixedVec3) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.instances.insert(
            id,
            SpawnedLootInstance {
                id,
                definition,
                quantity,
                position,
            },
        );
        id
    }

    fn tickets_for(&self, point: &LootSpawnPoint) -> Vec<u32> {
        self.catalog
            .iter()
            .map(|(_, definition)| {
                if !point.allowed.contains(&definition.category) {
                    return 0;
                }
                let tickets = definition.tickets();
                if point.high_value && definition.is_high_value() {
                    tickets.saturating_mul(self.config.high_value_multiplier)
                } else {
                    tickets
                }
            })
            .collect()
    }

    fn count_near(&self, center: FixedVec3, radius: Fixed) -> usize {
        self.instances
            .values()
            .filter(|i| center.within_planar(i.position, radius))
            .count()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Instances within `radius` of `center`, in id order.
    pub fn loot_in_radius(&self, center: FixedVec3, radius: Fixed) -> Vec<&SpawnedLootInstance> {
        self.instances
            .values()
            .filter(|i| center.within_planar(i.position, radius))
            .collect()
    }

    /// Instance by id.
    pub fn get(&self, id: u32) -> Option<&SpawnedLootInstance> {
        self.instances.get(&id)
    }

    /// Definition an instance refers to.
    pub fn definition_of(&self, instance: &SpawnedLootInstance) -> Option<&LootDefinition> {
        self.catalog.get(instance.definition)
    }

    /// Live instance count.
    pub fn count(&self) -> usize {
        self.instances.len()
    }

    /// Spawn points in use.
    pub fn points(&self) -> &[LootSpawnPoint] {
        &self.points
    }

    /// Catalog in use.
    pub fn catalog(&self) -> &LootCatalog {
        &self.catalog
    }

    /// Hash every live instance for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.next_id);
        hasher.update_u32(self.instances.len() as u32);
        for instance in self.instances.values() {
            hasher.update_u32(instance.id);
            hasher.update_u32(instance.definition as u32);
            hasher.update_u32(instance.quantity);
            hasher.update_vec3(instance.position);
        }
    }
}

/// Scatter points uniformly over the map, resting them on the ground.
///
/// A probe that hits nothing leaves the point at height zero.
pub fn generate_spawn_points(
    config: &LootSpawnerConfig,
    rng: &mut DeterministicRng,
    ground: &dyn GroundQuery,
) -> Vec<LootSpawnPoint> {
    (0..config.random_spawn_point_count)
        .map(|_| {
            let (x, z) = rng.random_map_point(config.map_half_extent);
            let y = ground
                .ground_height(x, z)
                .map(|h| h + config.spawn_height)
                .unwrap_or(0);
            let radius = rng.next_fixed_range(config.min_point_radius, config.max_point_radius);
            let max_items = rng.next_int_range(1, config.max_items_per_point.max(1) as i32) as u32;
            let high_value = rng.next_bool(config.high_value_chance);
            LootSpawnPoint::new(FixedVec3::new(x, y, z), radius, max_items).with_high_value(high_value)
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::inventory::InventoryConfig;
    use crate::game::world::{FlatGround, NoGround};

    fn spawner(total: u32, seed: u64) -> (LootSpawner, DeterministicRng) {
        let mut rng = DeterministicRng::new(seed);
        let config = LootSpawnerConfig { total_loot_items: total, ..LootSpawnerConfig::default() };
        let spawner = LootSpawner::new(Vec::new(), Vec::new(), config, &mut rng, &FlatGround::default());
        (spawner, rng)
    }

    #[test]
    fn test_generated_points_respect_bounds() {
        let mut rng = DeterministicRng::new(1);
        let config = LootSpawnerConfig::default();
        let points = generate_spawn_points(&config, &mut rng, &FlatGround::new(to_fixed(2.0)));

        assert_eq!(points.len(), 150);
        for point in &points {
            assert!(point.position.x.abs() <= MAP_HALF_EXTENT);
            assert!(point.position.z.abs() <= MAP_HALF_EXTENT);
            assert_eq!(point.position.y, to_fixed(2.5));
            assert!(point.radius >= FIXED_ONE && point.radius < 3 * FIXED_ONE);
            assert!((1..=3).contains(&point.max_items));
            assert_eq!(point.allowed.len(), 5);
        }
    }

    #[test]
    fn test_no_ground_leaves_points_at_zero() {
        let mut rng = DeterministicRng::new(1);
        let config = LootSpawnerConfig { random_spawn_point_count: 10, ..LootSpawnerConfig::default() };
        let points = generate_spawn_points(&config, &mut rng, &NoGround);
        assert!(points.iter().all(|p| p.position.y == 0));
    }

    #[test]
    fn test_initial_spawn_respects_limits() {
        let (mut spawner, mut rng) = spawner(50, 77);
        let spawned = spawner.spawn_initial(&mut rng);
        assert!(spawned <= 50);
        assert_eq!(spawner.count(), spawned as usize);

        let capacity: u32 = spawner.points().iter().map(|p| p.max_items).sum();
        assert!(spawned <= capacity);
    }

    #[test]
    fn test_spawn_is_deterministic() {
        let (mut a, mut rng_a) = spawner(60, 4242);
        let (mut b, mut rng_b) = spawner(60, 4242);
        a.spawn_initial(&mut rng_a);
        b.spawn_initial(&mut rng_b);

        let hash = |s: &LootSpawner| {
            let mut hasher = StateHasher::new(b"test");
            s.hash_into(&mut hasher);
            hasher.finalize()
        };
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_point_capacity_limits_items() {
        let mut rng = DeterministicRng::new(9);
        let point = LootSpawnPoint::new(FixedVec3::ZERO, FIXED_ONE, 2);
        let config = LootSpawnerConfig { total_loot_items: 10, ..LootSpawnerConfig::default() };
        let mut spawner = LootSpawner::new(Vec::new(), vec![point], config, &mut rng, &NoGround);

        assert_eq!(spawner.spawn_initial(&mut rng), 2);
        assert_eq!(spawner.loot_in_radius(FixedVec3::ZERO, FIXED_ONE).len(), 2);
    }

    #[test]
    fn test_category_filter() {
        let mut rng = DeterministicRng::new(3);
        let points = vec![
            LootSpawnPoint::new(FixedVec3::from_ints(-50, 0, 0), 2 * FIXED_ONE, 3)
                .with_categories([LootCategory::Ammo]),
            LootSpawnPoint::new(FixedVec3::from_ints(50, 0, 0), 2 * FIXED_ONE, 3)
                .with_categories([LootCategory::Ammo]),
        ];
        let config = LootSpawnerConfig { total_loot_items: 6, ..LootSpawnerConfig::default() };
        let mut spawner = LootSpawner::new(Vec::new(), points, config, &mut rng, &NoGround);
        spawner.spawn_initial(&mut rng);

        assert!(spawner.count() > 0);
        for instance in spawner.loot_in_radius(FixedVec3::ZERO, 100 * FIXED_ONE) {
            let definition = spawner.definition_of(instance).unwrap();
            assert_eq!(definition.category, LootCategory::Ammo);
            assert_eq!(instance.quantity, definition.base_quantity);
        }
    }

    #[test]
    fn test_point_without_candidates_spawns_nothing() {
        let mut rng = DeterministicRng::new(3);
        let point = LootSpawnPoint::new(FixedVec3::ZERO, FIXED_ONE, 3).with_categories([]);
        let config = LootSpawnerConfig { total_loot_items: 5, ..LootSpawnerConfig::default() };
        let mut spawner = LootSpawner::new(Vec::new(), vec![point], config, &mut rng, &NoGround);
        assert_eq!(spawner.spawn_initial(&mut rng), 0);
    }

    #[test]
    fn test_pickup_at_most_once() {
        let (mut spawner, mut rng) = spawner(20, 5);
        spawner.spawn_initial(&mut rng);
        let id = spawner.loot_in_radius(FixedVec3::ZERO, 1000 * FIXED_ONE)[0].id;

        let mut first = Inventory::new(&InventoryConfig::default());
        let mut second = Inventory::new(&InventoryConfig::default());
        let picked = spawner.pickup_into(id, &mut first).unwrap();
        assert_eq!(picked.id, id);
        assert!(spawner.get(id).is_none());

        assert_eq!(spawner.pickup_into(id, &mut second), Err(PickupError::NotFound(id)));
        assert!(second.stacks().is_empty());
    }

    #[test]
    fn test_rejected_pickup_stays_in_world() {
        let mut rng = DeterministicRng::new(5);
        let point = LootSpawnPoint::new(FixedVec3::ZERO, FIXED_ONE, 1)
            .with_categories([LootCategory::Weapon]);
        let config = LootSpawnerConfig { total_loot_items: 1, ..LootSpawnerConfig::default() };
        let mut spawner = LootSpawner::new(Vec::new(), vec![point], config, &mut rng, &NoGround);
        spawner.spawn_initial(&mut rng);

        let full = InventoryConfig { max_weight: 4 * FIXED_ONE, ..InventoryConfig::default() };
        let mut inventory = Inventory::new(&full);
        let id = spawner.loot_in_radius(FixedVec3::ZERO, FIXED_ONE)[0].id;

        assert!(matches!(
            spawner.pickup_into(id, &mut inventory),
            Err(PickupError::Inventory(InventoryError::WeightExceeded { .. }))
        ));
        assert!(spawner.get(id).is_some());
    }

    #[test]
    fn test_drop_creates_instance() {
        let (mut spawner, _) = spawner(0, 1);
        let key = ItemKey::new("Bandage", LootCategory::Health);
        let id = spawner.drop_into_world(&key, 3, FixedVec3::from_ints(5, 0, 5)).unwrap();

        let instance = spawner.get(id).unwrap();
        assert_eq!(instance.quantity, 3);
        assert_eq!(spawner.definition_of(instance).map(|d| d.name.as_str()), Some("Bandage"));

        let unknown = ItemKey::new("Rock", LootCategory::Utility);
        assert_eq!(
            spawner.drop_into_world(&unknown, 1, FixedVec3::ZERO),
            Err(PickupError::UnknownItem("Rock".into()))
        );
    }

    #[test]
    fn test_respawn_all_replaces_loot() {
        let (mut spawner, mut rng) = spawner(30, 12);
        spawner.spawn_initial(&mut rng);
        let first_ids: Vec<u32> = spawner.loot_in_radius(FixedVec3::ZERO, 1000 * FIXED_ONE).iter().map(|i| i.id).collect();

        spawner.respawn_all(&mut rng);
        assert!(spawner.count() <= 30);
        assert!(first_ids.iter().all(|id| spawner.get(*id).is_none()));
    }

    #[test]
    fn test_spawn_near_coordinate_limit() {
        let mut rng = DeterministicRng::new(9);
        let edge = FixedVec3::new(i32::MAX - FIXED_ONE, 0, i32::MIN + FIXED_ONE);
        let point = LootSpawnPoint::new(edge, 3 * FIXED_ONE, 3);
        let config = LootSpawnerConfig { total_loot_items: 3, ..LootSpawnerConfig::default() };
        let mut spawner = LootSpawner::new(Vec::new(), vec![point], config, &mut rng, &FlatGround::default());

        let spawned = spawner.spawn_initial(&mut rng);
        assert!(spawned >= 1);
        for id in 0..spawned {
            let instance = spawner.get(id).unwrap();
            assert!(instance.position.x >= edge.x - 3 * FIXED_ONE);
            assert!(instance.position.z <= edge.z + 3 * FIXED_ONE);
        }
    }
}

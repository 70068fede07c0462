//! Inventory and Equipment
//!
//! Stacks keyed by (name, category), a weight budget, a stack-slot budget
//! and equipment slots that hold weak item keys.
//!
//! Weight is always derived as `unit_weight × quantity` in fixed-point and
//! summed, never adjusted incrementally, so it cannot drift.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::fixed::{Fixed, FIXED_ONE};
use crate::core::hash::StateHasher;
use crate::game::health::HealthState;
use crate::game::loot::LootCategory;

/// Number of weapon slots.
pub const WEAPON_SLOTS: usize = 3;
/// Number of quick-use slots.
pub const QUICK_SLOTS: usize = 4;

// =============================================================================
// ERRORS
// =============================================================================

/// Rejected inventory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// No free stack slot and no compatible stack with headroom
    #[error("inventory full: cannot fit {quantity} x {name}")]
    CapacityExceeded {
        /// Item name
        name: String,
        /// Requested quantity
        quantity: u32,
    },

    /// Carrying the item would exceed the weight budget
    #[error("too heavy: {name} would bring weight over the limit")]
    WeightExceeded {
        /// Item name
        name: String,
    },

    /// The item is not held
    #[error("item not in inventory: {0}")]
    ItemNotFound(String),

    /// Target equipment slot already holds an item
    #[error("equipment slot occupied: {0}")]
    SlotOccupied(&'static str),

    /// Quick-use slot index out of range
    #[error("invalid quick-use slot: {0}")]
    InvalidSlot(usize),

    /// Zero quantity requested
    #[error("quantity must be positive")]
    ZeroQuantity,
}

// =============================================================================
// TYPES
// =============================================================================

/// Stacking identity of an item.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    /// Item name
    pub name: String,
    /// Item family
    pub category: LootCategory,
}

impl ItemKey {
    /// Build a key.
    pub fn new(name: impl Into<String>, category: LootCategory) -> Self {
        Self { name: name.into(), category }
    }
}

/// A stack of identical items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStack {
    /// Item name
    pub name: String,
    /// Item family
    pub category: LootCategory,
    /// Units held, always in 1..=category cap
    pub quantity: u32,
}

impl InventoryStack {
    /// Weight of the whole stack.
    pub fn weight(&self) -> Fixed {
        item_weight(self.category, self.quantity)
    }

    /// Stacking key.
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.name.clone(), self.category)
    }

    fn matches(&self, name: &str, category: LootCategory) -> bool {
        self.name == name && self.category == category
    }
}

/// Weight of `quantity` units of a category, saturating.
pub fn item_weight(category: LootCategory, quantity: u32) -> Fixed {
    let wide = category.unit_weight() as i64 * quantity as i64;
    wide.min(Fixed::MAX as i64) as Fixed
}

/// Which armor slot an item goes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmorSlot {
    /// Head
    Helmet,
    /// Body
    Vest,
}

impl ArmorSlot {
    /// Vests by name, everything else is a helmet.
    pub fn for_item(name: &str) -> Self {
        if name.contains("Vest") {
            ArmorSlot::Vest
        } else {
            ArmorSlot::Helmet
        }
    }

    fn label(self) -> &'static str {
        match self {
            ArmorSlot::Helmet => "helmet",
            ArmorSlot::Vest => "vest",
        }
    }
}

/// Equipped items. Slots hold keys only; nothing here owns items.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentSlots {
    /// Weapon slots
    pub weapons: [Option<ItemKey>; WEAPON_SLOTS],
    /// Helmet slot
    pub helmet: Option<ItemKey>,
    /// Vest slot
    pub vest: Option<ItemKey>,
    /// Quick-use bindings
    pub quick_use: [Option<ItemKey>; QUICK_SLOTS],
}

impl EquipmentSlots {
    fn armor_slot_mut(&mut self, slot: ArmorSlot) -> &mut Option<ItemKey> {
        match slot {
            ArmorSlot::Helmet => &mut self.helmet,
            ArmorSlot::Vest => &mut self.vest,
        }
    }
}

/// Outcome of using an item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemUse {
    /// Health restored
    Healed {
        /// Health actually gained
        amount: Fixed,
    },
    /// Weapon placed in a slot
    WeaponEquipped {
        /// Slot index
        slot: usize,
    },
    /// Armor worn
    ArmorEquipped {
        /// Slot used
        slot: ArmorSlot,
        /// Armor actually gained
        armor: Fixed,
    },
    /// Ammo stack handed to the weapon system
    AmmoLoaded {
        /// Rounds loaded
        quantity: u32,
    },
    /// Utility item consumed
    Consumed,
    /// Nothing happened; the item stays in the inventory
    NoEffect,
}

/// Inventory limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Maximum number of stacks
    pub max_slots: usize,
    /// Maximum carried weight
    #[serde(with = "crate::core::fixed::as_float")]
    pub max_weight: Fixed,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_slots: 20,
            max_weight: 100 * FIXED_ONE,
        }
    }
}

/// Healing granted by a health item, by exact name.
pub fn heal_amount(name: &str) -> Option<Fixed> {
    match name {
        "Medkit" => Some(100 * FIXED_ONE),
        "First Aid Kit" => Some(75 * FIXED_ONE),
        "Bandage" => Some(20 * FIXED_ONE),
        _ => None,
    }
}

/// Armor granted by an armor item, by level in its name.
pub fn armor_value(name: &str) -> Fixed {
    if name.contains("Level 1") {
        25 * FIXED_ONE
    } else if name.contains("Level 2") {
        50 * FIXED_ONE
    } else if name.contains("Level 3") {
        75 * FIXED_ONE
    } else {
        0
    }
}

// =============================================================================
// INVENTORY
// =============================================================================

/// A player's carried items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    stacks: Vec<InventoryStack>,
    equipment: EquipmentSlots,
    max_slots: usize,
    max_weight: Fixed,
}

impl Inventory {
    /// Empty inventory with the given limits.
    pub fn new(config: &InventoryConfig) -> Self {
        Self {
            stacks: Vec::new(),
            equipment: EquipmentSlots::default(),
            max_slots: config.max_slots,
            max_weight: config.max_weight,
        }
    }

    /// Check whether `quantity` units would fit.
    pub fn can_pickup(&self, name: &str, category: LootCategory, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::ZeroQuantity);
        }

        let cap = category.stack_cap();
        let headroom: u64 = self
            .stacks
            .iter()
            .filter(|s| s.matches(name, category))
            .map(|s| cap.saturating_sub(s.quantity) as u64)
            .sum();
        let remainder = (quantity as u64).saturating_sub(headroom);
        let new_stacks = remainder.div_ceil(cap as u64);
        let free_slots = self.max_slots.saturating_sub(self.stacks.len()) as u64;
        if new_stacks > free_slots {
            return Err(InventoryError::CapacityExceeded {
                name: name.to_string(),
                quantity,
            });
        }

        let added = category.unit_weight() as i64 * quantity as i64;
        if self.current_weight() as i64 + added > self.max_weight as i64 {
            return Err(InventoryError::WeightExceeded { name: name.to_string() });
        }
        Ok(())
    }

    /// Add items, topping up existing stacks before opening new ones.
    pub fn pickup(&mut self, name: &str, category: LootCategory, quantity: u32) -> Result<(), InventoryError> {
        self.can_pickup(name, category, quantity)?;

        let cap = category.stack_cap();
        let mut remaining = quantity;
        for stack in self.stacks.iter_mut().filter(|s| s.matches(name, category)) {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(cap.saturating_sub(stack.quantity));
            stack.quantity += take;
            remaining -= take;
        }
        while remaining > 0 {
            let take = remaining.min(cap);
            self.stacks.push(InventoryStack {
                name: name.to_string(),
                category,
                quantity: take,
            });
            remaining -= take;
        }
        Ok(())
    }

    /// Remove up to `quantity` units, emptiest stacks last. Returns units removed.
    fn remove(&mut self, name: &str, category: LootCategory, quantity: u32) -> u32 {
        let mut remaining = quantity;
        for stack in self.stacks.iter_mut().rev().filter(|s| s.matches(name, category)) {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(stack.quantity);
            stack.quantity -= take;
            remaining -= take;
        }
        self.stacks.retain(|s| s.quantity > 0);
        quantity - remaining
    }

    /// Use one item (or a whole ammo stack) and apply its effect to `health`.
    pub fn use_item(&mut self, name: &str, health: &mut HealthState) -> Result<ItemUse, InventoryError> {
        let category = self
            .find(name)
            .map(|s| s.category)
            .ok_or_else(|| InventoryError::ItemNotFound(name.to_string()))?;

        let outcome = match category {
            LootCategory::Health => match heal_amount(name) {
                Some(amount) => {
                    let healed = health.heal(amount);
                    self.remove(name, category, 1);
                    ItemUse::Healed { amount: healed }
                }
                None => ItemUse::NoEffect,
            },
            LootCategory::Weapon => {
                match self.equipment.weapons.iter().position(Option::is_none) {
                    Some(slot) => {
                        self.equipment.weapons[slot] = Some(ItemKey::new(name, category));
                        self.remove(name, category, 1);
                        ItemUse::WeaponEquipped { slot }
                    }
                    None => ItemUse::NoEffect,
                }
            }
            LootCategory::Armor => {
                let slot = ArmorSlot::for_item(name);
                let target = self.equipment.armor_slot_mut(slot);
                if target.is_some() {
                    return Err(InventoryError::SlotOccupied(slot.label()));
                }
                *target = Some(ItemKey::new(name, category));
                let armor = health.add_armor(armor_value(name));
                self.remove(name, category, 1);
                ItemUse::ArmorEquipped { slot, armor }
            }
            LootCategory::Ammo => {
                let held = self.item_count(name);
                let quantity = self.remove(name, category, held);
                ItemUse::AmmoLoaded { quantity }
            }
            LootCategory::Utility => {
                self.remove(name, category, 1);
                ItemUse::Consumed
            }
        };
        Ok(outcome)
    }

    /// Take `quantity` units out for dropping into the world.
    ///
    /// Asking for at least the held amount drops everything held.
    pub fn drop_item(&mut self, name: &str, quantity: u32) -> Result<(ItemKey, u32), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::ZeroQuantity);
        }
        let key = self
            .find(name)
            .map(InventoryStack::key)
            .ok_or_else(|| InventoryError::ItemNotFound(name.to_string()))?;
        let removed = self.remove(&key.name, key.category, quantity);
        Ok((key, removed))
    }

    /// Bind a held item to a quick-use slot.
    pub fn assign_quick_slot(&mut self, slot: usize, name: &str) -> Result<(), InventoryError> {
        if slot >= QUICK_SLOTS {
            return Err(InventoryError::InvalidSlot(slot));
        }
        let key = self
            .find(name)
            .map(InventoryStack::key)
            .ok_or_else(|| InventoryError::ItemNotFound(name.to_string()))?;
        self.equipment.quick_use[slot] = Some(key);
        Ok(())
    }

    /// Use whatever a quick-use slot references, if still held.
    pub fn use_quick_slot(&mut self, slot: usize, health: &mut HealthState) -> Result<ItemUse, InventoryError> {
        let key = self
            .equipment
            .quick_use
            .get(slot)
            .ok_or(InventoryError::InvalidSlot(slot))?
            .clone();
        match key {
            Some(key) if self.item_count(&key.name) > 0 => self.use_item(&key.name, health),
            _ => Ok(ItemUse::NoEffect),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// First stack with this name.
    pub fn find(&self, name: &str) -> Option<&InventoryStack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    /// All stacks of a category.
    pub fn items_by_category(&self, category: LootCategory) -> Vec<&InventoryStack> {
        self.stacks.iter().filter(|s| s.category == category).collect()
    }

    /// Units held across every stack with this name.
    pub fn item_count(&self, name: &str) -> u32 {
        self.stacks
            .iter()
            .filter(|s| s.name == name)
            .map(|s| s.quantity)
            .sum()
    }

    /// All stacks, in insertion order.
    pub fn stacks(&self) -> &[InventoryStack] {
        &self.stacks
    }

    /// Equipped items.
    pub fn equipment(&self) -> &EquipmentSlots {
        &self.equipment
    }

    /// Total carried weight.
    pub fn current_weight(&self) -> Fixed {
        let total: i64 = self.stacks.iter().map(|s| s.weight() as i64).sum();
        total.min(Fixed::MAX as i64) as Fixed
    }

    /// Weight budget.
    pub fn max_weight(&self) -> Fixed {
        self.max_weight
    }

    /// Every stack slot is taken.
    pub fn is_full(&self) -> bool {
        self.stacks.len() >= self.max_slots
    }

    /// Carrying more than the budget.
    pub fn is_overweight(&self) -> bool {
        self.current_weight() > self.max_weight
    }

    /// Drop everything, including equipment bindings.
    pub fn clear(&mut self) {
        self.stacks.clear();
        self.equipment = EquipmentSlots::default();
    }

    /// Hash contents for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.stacks.len() as u32);
        for stack in &self.stacks {
            hasher.update_str(&stack.name);
            hasher.update_u8(stack.category as u8);
            hasher.update_u32(stack.quantity);
        }
        let slots = self
            .equipment
            .weapons
            .iter()
            .chain([&self.equipment.helmet, &self.equipment.vest])
            .chain(self.equipment.quick_use.iter());
        for slot in slots {
            match slot {
                Some(key) => hasher.update_str(&key.name),
                None => hasher.update_u32(0),
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

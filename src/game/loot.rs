//! Loot Catalog
//!
//! Immutable item definitions. Spawn weights are quantized to integer
//! tickets so weighted selection is exact integer math.

use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::core::fixed::{Fixed, FIXED_HALF, FIXED_ONE, to_fixed};

// =============================================================================
// CATEGORY
// =============================================================================

/// Broad item family. Drives stacking, weight and use behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LootCategory {
    /// Firearms, equipped into weapon slots
    Weapon = 0,
    /// Ammunition, loaded wholesale
    Ammo = 1,
    /// Consumable healing
    Health = 2,
    /// Helmets and vests
    Armor = 3,
    /// Throwables and other consumables
    Utility = 4,
}

impl LootCategory {
    /// Every category, in discriminant order.
    pub const ALL: [LootCategory; 5] = [
        LootCategory::Weapon,
        LootCategory::Ammo,
        LootCategory::Health,
        LootCategory::Armor,
        LootCategory::Utility,
    ];

    /// Largest quantity a single inventory stack may hold.
    pub fn stack_cap(self) -> u32 {
        match self {
            LootCategory::Ammo => 999,
            LootCategory::Health => 5,
            LootCategory::Utility => 10,
            LootCategory::Weapon | LootCategory::Armor => 1,
        }
    }

    /// Carry weight of a single unit.
    pub fn unit_weight(self) -> Fixed {
        match self {
            LootCategory::Weapon => 5 * FIXED_ONE,
            LootCategory::Armor => 3 * FIXED_ONE,
            LootCategory::Health => FIXED_ONE,
            LootCategory::Ammo => to_fixed(0.1),
            LootCategory::Utility => 2 * FIXED_ONE,
        }
    }
}

impl fmt::Display for LootCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LootCategory::Weapon => "weapon",
            LootCategory::Ammo => "ammo",
            LootCategory::Health => "health",
            LootCategory::Armor => "armor",
            LootCategory::Utility => "utility",
        };
        f.write_str(name)
    }
}

// =============================================================================
// DEFINITION
// =============================================================================

/// A catalog entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootDefinition {
    /// Display name, also the stacking key together with the category
    pub name: String,
    /// Item family
    pub category: LootCategory,
    /// Quantity of a freshly spawned instance
    pub base_quantity: u32,
    /// Relative spawn weight (≥ 0)
    #[serde(with = "crate::core::fixed::as_float")]
    pub spawn_weight: Fixed,
    /// Presentation icon reference
    #[serde(default)]
    pub icon: Option<String>,
    /// Flavour text
    #[serde(default)]
    pub description: String,
}

impl LootDefinition {
    /// Create a definition.
    pub fn new(
        name: impl Into<String>,
        category: LootCategory,
        base_quantity: u32,
        spawn_weight: Fixed,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            base_quantity,
            spawn_weight: spawn_weight.max(0),
            icon: None,
            description: description.into(),
        }
    }

    /// Selection tickets: `round(weight × 10)`.
    pub fn tickets(&self) -> u32 {
        let scaled = self.spawn_weight.max(0) as i64 * 10;
        ((scaled + FIXED_HALF as i64) >> 16) as u32
    }

    /// Items that get bonus weight at high-value spawn points.
    pub fn is_high_value(&self) -> bool {
        match self.category {
            LootCategory::Weapon => true,
            LootCategory::Armor => self.name.contains("Level 3"),
            LootCategory::Health => self.name.contains("Medkit"),
            LootCategory::Ammo | LootCategory::Utility => false,
        }
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Ordered set of definitions. Instances reference entries by index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LootCatalog {
    items: Vec<LootDefinition>,
}

impl LootCatalog {
    /// Wrap an explicit list of definitions.
    pub fn new(items: Vec<LootDefinition>) -> Self {
        Self { items }
    }

    /// Use `items` unless empty, in which case fall back to the built-in catalog.
    pub fn or_default(items: Vec<LootDefinition>) -> Self {
        if items.is_empty() {
            info!("Loot catalog empty, using default catalog");
            Self::default_catalog()
        } else {
            Self::new(items)
        }
    }

    /// The built-in 13-item catalog.
    pub fn default_catalog() -> Self {
        use LootCategory::*;
        let items = vec![
            LootDefinition::new("AK-47", Weapon, 1, to_fixed(0.8), "High damage assault rifle"),
            LootDefinition::new("M4A1", Weapon, 1, to_fixed(0.9), "Balanced assault rifle"),
            LootDefinition::new("AWM Sniper", Weapon, 1, to_fixed(0.3), "High damage sniper rifle"),
            LootDefinition::new("UMP9 SMG", Weapon, 1, to_fixed(1.0), "Fast firing SMG"),
            LootDefinition::new("7.62 Ammo", Ammo, 30, to_fixed(1.5), "Rifle ammunition"),
            LootDefinition::new("5.56 Ammo", Ammo, 30, to_fixed(1.5), "Assault rifle ammunition"),
            LootDefinition::new("9mm Ammo", Ammo, 40, to_fixed(1.2), "SMG ammunition"),
            LootDefinition::new("Medkit", Health, 1, to_fixed(0.6), "Restores 100 health"),
            LootDefinition::new("Bandage", Health, 1, to_fixed(1.0), "Restores 20 health"),
            LootDefinition::new("First Aid Kit", Health, 1, to_fixed(0.4), "Restores 75 health"),
            LootDefinition::new("Level 1 Helmet", Armor, 1, to_fixed(0.8), "Basic head protection"),
            LootDefinition::new("Level 2 Vest", Armor, 1, to_fixed(0.6), "Medium body protection"),
            LootDefinition::new("Level 3 Helmet", Armor, 1, to_fixed(0.2), "Maximum head protection"),
        ];
        Self { items }
    }

    /// Definition at `index`.
    pub fn get(&self, index: usize) -> Option<&LootDefinition> {
        self.items.get(index)
    }

    /// Index of the definition with this name and category.
    pub fn find(&self, name: &str, category: LootCategory) -> Option<usize> {
        self.items
            .iter()
            .position(|d| d.name == name && d.category == category)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Is the catalog empty?
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate definitions with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &LootDefinition)> {
        self.items.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_contents() {
        let catalog = LootCatalog::default_catalog();
        assert_eq!(catalog.len(), 13);
        assert!(catalog.find("Bandage", LootCategory::Health).is_some());
        assert!(catalog.find("Bandage", LootCategory::Ammo).is_none());

        let ammo = catalog.find("9mm Ammo", LootCategory::Ammo).and_then(|i| catalog.get(i));
        assert_eq!(ammo.map(|d| d.base_quantity), Some(40));
    }

    #[test]
    fn test_tickets_round_weight_times_ten() {
        let catalog = LootCatalog::default_catalog();
        let tickets = |name: &str| {
            catalog
                .iter()
                .find(|(_, d)| d.name == name)
                .map(|(_, d)| d.tickets())
        };
        assert_eq!(tickets("AK-47"), Some(8));
        assert_eq!(tickets("AWM Sniper"), Some(3));
        assert_eq!(tickets("7.62 Ammo"), Some(15));
        assert_eq!(tickets("Level 3 Helmet"), Some(2));

        let zero = LootDefinition::new("Rock", LootCategory::Utility, 1, 0, "");
        assert_eq!(zero.tickets(), 0);
    }

    #[test]
    fn test_high_value_classification() {
        let catalog = LootCatalog::default_catalog();
        let high: Vec<&str> = catalog
            .iter()
            .filter(|(_, d)| d.is_high_value())
            .map(|(_, d)| d.name.as_str())
            .collect();
        assert_eq!(
            high,
            vec!["AK-47", "M4A1", "AWM Sniper", "UMP9 SMG", "Medkit", "Level 3 Helmet"]
        );
    }

    #[test]
    fn test_empty_catalog_falls_back() {
        assert_eq!(LootCatalog::or_default(Vec::new()).len(), 13);
        let custom = vec![LootDefinition::new("Grenade", LootCategory::Utility, 1, FIXED_ONE, "")];
        assert_eq!(LootCatalog::or_default(custom).len(), 1);
    }

    #[test]
    fn test_stack_caps_and_weights() {
        assert_eq!(LootCategory::Ammo.stack_cap(), 999);
        assert_eq!(LootCategory::Health.stack_cap(), 5);
        assert_eq!(LootCategory::Weapon.stack_cap(), 1);
        assert_eq!(LootCategory::Weapon.unit_weight(), to_fixed(5.0));
        assert_eq!(LootCategory::Ammo.unit_weight(), to_fixed(0.1));
    }
}

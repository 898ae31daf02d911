//! Starter catalog.
//!
//! The first ten entries are the item types that used to live as fixed fields
//! on warehouse/technician records (`n950Boxes`, `stcSimUnits`, ...). Seeding
//! them into the registry lets every runtime path address stock uniformly as
//! `(ownerKind, ownerId, itemTypeId)`.

use chrono::{DateTime, Utc};

use crate::item_type::{Category, ItemType, ItemTypeId, ItemTypeSpec};
use crate::packaging::PackagingRule;

/// Ids of item types that also exist as historical per-owner fields.
pub const LEGACY_ITEM_TYPE_IDS: [&str; 10] = [
    "n950",
    "i9000s",
    "i9100",
    "rollPaper",
    "stickers",
    "newBatteries",
    "mobilySim",
    "stcSim",
    "zainSim",
    "lebaraSim",
];

struct Seed {
    id: &'static str,
    name_local: &'static str,
    name_alt: &'static str,
    category: Category,
    units_per_box: i64,
}

const SEEDS: [Seed; 10] = [
    Seed { id: "n950", name_local: "جهاز N950", name_alt: "N950 Device", category: Category::Devices, units_per_box: 10 },
    Seed { id: "i9000s", name_local: "جهاز I9000S", name_alt: "I9000S Device", category: Category::Devices, units_per_box: 10 },
    Seed { id: "i9100", name_local: "جهاز I9100", name_alt: "I9100 Device", category: Category::Devices, units_per_box: 10 },
    Seed { id: "rollPaper", name_local: "ورق حراري", name_alt: "Thermal Roll Paper", category: Category::Papers, units_per_box: 50 },
    Seed { id: "stickers", name_local: "ملصقات", name_alt: "Stickers", category: Category::Papers, units_per_box: 100 },
    Seed { id: "newBatteries", name_local: "بطاريات جديدة", name_alt: "New Batteries", category: Category::Accessories, units_per_box: 20 },
    Seed { id: "mobilySim", name_local: "شريحة موبايلي", name_alt: "Mobily SIM", category: Category::Sim, units_per_box: 100 },
    Seed { id: "stcSim", name_local: "شريحة STC", name_alt: "STC SIM", category: Category::Sim, units_per_box: 100 },
    Seed { id: "zainSim", name_local: "شريحة زين", name_alt: "Zain SIM", category: Category::Sim, units_per_box: 100 },
    Seed { id: "lebaraSim", name_local: "شريحة ليبارا", name_alt: "Lebara SIM", category: Category::Sim, units_per_box: 100 },
];

/// Build the fixed starter catalog, stamped with `now`.
pub fn default_catalog(now: DateTime<Utc>) -> Vec<ItemType> {
    SEEDS
        .iter()
        .enumerate()
        .filter_map(|(idx, seed)| {
            // Seed ids are compile-time constants that satisfy the id grammar.
            let id = ItemTypeId::parse(seed.id).ok()?;
            let spec = ItemTypeSpec {
                name_local: seed.name_local.to_string(),
                name_alt: seed.name_alt.to_string(),
                category: seed.category,
                packaging_rule: PackagingRule::Both,
                units_per_box: seed.units_per_box,
                is_active: true,
                is_visible: true,
                sort_order: (idx as i32 + 1) * 10,
            };
            Some(ItemType::restore(id, spec, now, now))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_covers_every_legacy_field() {
        let catalog = default_catalog(Utc::now());
        assert_eq!(catalog.len(), SEEDS.len());

        let ids: HashSet<&str> = catalog.iter().map(|i| i.id().as_str()).collect();
        for legacy in LEGACY_ITEM_TYPE_IDS {
            assert!(ids.contains(legacy), "missing legacy item type {legacy}");
        }
    }

    #[test]
    fn sort_order_is_strictly_increasing() {
        let catalog = default_catalog(Utc::now());
        assert!(catalog.windows(2).all(|w| w[0].sort_order() < w[1].sort_order()));
    }
}

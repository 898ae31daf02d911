//! Item type catalog (registry domain).
//!
//! Canonical catalog of trackable product types. Every other module resolves
//! item identity, packaging rules and box/unit conversion through here.
//! Pure domain logic: validation and state changes, no storage.

pub mod defaults;
pub mod item_type;
pub mod packaging;

pub use defaults::{LEGACY_ITEM_TYPE_IDS, default_catalog};
pub use item_type::{
    CatalogEvent, Category, ItemType, ItemTypeChanged, ItemTypeId, ItemTypePatch, ItemTypeSpec,
    NewItemType,
};
pub use packaging::{PackagingRule, PackagingType};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DomainError, DomainResult};
use stockline_events::Event;

use crate::packaging::PackagingRule;

const MAX_ID_LEN: usize = 64;

/// Item type identifier.
///
/// Human-readable slug ("n950", "stcSim"). Legacy item types keep the names of
/// the historical per-owner fields they replace, so ids are strings rather than
/// UUIDs. Immutable once the item type exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemTypeId(String);

impl ItemTypeId {
    /// Parse and validate a caller-supplied id.
    pub fn parse(raw: impl AsRef<str>) -> DomainResult<Self> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(DomainError::invalid_id("ItemTypeId: empty"));
        }
        if raw.len() > MAX_ID_LEN {
            return Err(DomainError::invalid_id(format!(
                "ItemTypeId: longer than {MAX_ID_LEN} characters"
            )));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DomainError::invalid_id(format!(
                "ItemTypeId: '{raw}' may only contain ASCII letters, digits, '_' and '-'"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Generate a fresh id for an item type created without one.
    pub fn generate() -> Self {
        Self(format!("it_{}", uuid::Uuid::now_v7().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ItemTypeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for ItemTypeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Devices,
    Papers,
    Sim,
    Accessories,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Devices => "devices",
            Category::Papers => "papers",
            Category::Sim => "sim",
            Category::Accessories => "accessories",
            Category::Other => "other",
        }
    }
}

impl core::str::FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "devices" => Ok(Category::Devices),
            "papers" => Ok(Category::Papers),
            "sim" => Ok(Category::Sim),
            "accessories" => Ok(Category::Accessories),
            "other" => Ok(Category::Other),
            other => Err(DomainError::validation(format!("unknown category '{other}'"))),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Mutable attributes of an item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTypeSpec {
    pub name_local: String,
    pub name_alt: String,
    pub category: Category,
    pub packaging_rule: PackagingRule,
    /// Box → unit conversion factor. Display/export only; never applied to stored counters.
    pub units_per_box: i64,
    pub is_active: bool,
    pub is_visible: bool,
    pub sort_order: i32,
}

impl ItemTypeSpec {
    fn normalized(mut self) -> DomainResult<Self> {
        self.name_local = self.name_local.trim().to_string();
        self.name_alt = self.name_alt.trim().to_string();

        if self.name_local.is_empty() {
            return Err(DomainError::validation("nameLocal cannot be empty"));
        }
        if self.name_alt.is_empty() {
            return Err(DomainError::validation("nameAlt cannot be empty"));
        }
        if self.units_per_box <= 0 {
            return Err(DomainError::validation("unitsPerBox must be positive"));
        }
        Ok(self)
    }
}

/// Input for creating an item type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItemType {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub name_local: String,
    pub name_alt: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "NewItemType::default_rule")]
    pub packaging_rule: PackagingRule,
    #[serde(default)]
    pub units_per_box: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl NewItemType {
    fn default_rule() -> PackagingRule {
        PackagingRule::Both
    }

    /// Minimal constructor (active, visible, both packagings, 1 unit per box).
    pub fn named(name_local: impl Into<String>, name_alt: impl Into<String>) -> Self {
        Self {
            id: None,
            name_local: name_local.into(),
            name_alt: name_alt.into(),
            category: Category::Other,
            packaging_rule: PackagingRule::Both,
            units_per_box: None,
            is_active: true,
            is_visible: true,
            sort_order: 0,
        }
    }
}

/// Partial update. `id` is deliberately absent: ids never change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ItemTypePatch {
    pub name_local: Option<String>,
    pub name_alt: Option<String>,
    pub category: Option<Category>,
    pub packaging_rule: Option<PackagingRule>,
    pub units_per_box: Option<i64>,
    pub sort_order: Option<i32>,
}

impl ItemTypePatch {
    pub fn is_empty(&self) -> bool {
        self == &ItemTypePatch::default()
    }
}

/// Entity: ItemType.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemType {
    id: ItemTypeId,
    #[serde(flatten)]
    spec: ItemTypeSpec,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemType {
    /// Validate input and build a new item type.
    ///
    /// Uniqueness of the id is the registry's concern (it owns the table).
    pub fn create(input: NewItemType, now: DateTime<Utc>) -> DomainResult<(Self, CatalogEvent)> {
        let id = match input.id.as_deref() {
            Some(raw) => ItemTypeId::parse(raw)?,
            None => ItemTypeId::generate(),
        };

        let spec = ItemTypeSpec {
            name_local: input.name_local,
            name_alt: input.name_alt,
            category: input.category,
            packaging_rule: input.packaging_rule,
            units_per_box: input.units_per_box.unwrap_or(1),
            is_active: input.is_active,
            is_visible: input.is_visible,
            sort_order: input.sort_order,
        }
        .normalized()?;

        let item = Self {
            id,
            spec,
            created_at: now,
            updated_at: now,
        };
        let event = CatalogEvent::ItemTypeCreated(item.changed(now));
        Ok((item, event))
    }

    /// Rebuild from a persisted row (already validated on the way in).
    pub fn restore(
        id: ItemTypeId,
        spec: ItemTypeSpec,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            spec,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &ItemTypeId {
        &self.id
    }

    pub fn spec(&self) -> &ItemTypeSpec {
        &self.spec
    }

    pub fn name_local(&self) -> &str {
        &self.spec.name_local
    }

    pub fn name_alt(&self) -> &str {
        &self.spec.name_alt
    }

    pub fn category(&self) -> Category {
        self.spec.category
    }

    pub fn packaging_rule(&self) -> PackagingRule {
        self.spec.packaging_rule
    }

    pub fn units_per_box(&self) -> i64 {
        self.spec.units_per_box
    }

    pub fn is_active(&self) -> bool {
        self.spec.is_active
    }

    pub fn is_visible(&self) -> bool {
        self.spec.is_visible
    }

    pub fn sort_order(&self) -> i32 {
        self.spec.sort_order
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Display/export total: `boxes * unitsPerBox + units`.
    ///
    /// For unit-only items the factor is ignored (boxes count as nothing extra).
    pub fn display_total(&self, boxes: i64, units: i64) -> i64 {
        if self.spec.packaging_rule.uses_boxes() {
            boxes.saturating_mul(self.spec.units_per_box).saturating_add(units)
        } else {
            units
        }
    }

    /// Apply a partial update. Nothing changes unless the result validates.
    pub fn apply_patch(&mut self, patch: ItemTypePatch, now: DateTime<Utc>) -> DomainResult<CatalogEvent> {
        if patch.is_empty() {
            return Err(DomainError::validation("patch contains no changes"));
        }

        let mut spec = self.spec.clone();
        if let Some(v) = patch.name_local {
            spec.name_local = v;
        }
        if let Some(v) = patch.name_alt {
            spec.name_alt = v;
        }
        if let Some(v) = patch.category {
            spec.category = v;
        }
        if let Some(v) = patch.packaging_rule {
            spec.packaging_rule = v;
        }
        if let Some(v) = patch.units_per_box {
            spec.units_per_box = v;
        }
        if let Some(v) = patch.sort_order {
            spec.sort_order = v;
        }

        self.spec = spec.normalized()?;
        self.updated_at = now;
        Ok(CatalogEvent::ItemTypeUpdated(self.changed(now)))
    }

    /// Flip the active flag. Existing ledger records are untouched.
    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) -> CatalogEvent {
        self.spec.is_active = active;
        self.updated_at = now;
        CatalogEvent::ActivationToggled(self.changed(now))
    }

    /// Flip the visibility flag. Existing ledger records are untouched.
    pub fn set_visible(&mut self, visible: bool, now: DateTime<Utc>) -> CatalogEvent {
        self.spec.is_visible = visible;
        self.updated_at = now;
        CatalogEvent::VisibilityToggled(self.changed(now))
    }

    fn changed(&self, now: DateTime<Utc>) -> ItemTypeChanged {
        ItemTypeChanged {
            item_type_id: self.id.clone(),
            is_active: self.spec.is_active,
            is_visible: self.spec.is_visible,
            occurred_at: now,
        }
    }
}

/// Event payload shared by all catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeChanged {
    pub item_type_id: ItemTypeId,
    pub is_active: bool,
    pub is_visible: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogEvent {
    ItemTypeCreated(ItemTypeChanged),
    ItemTypeUpdated(ItemTypeChanged),
    ActivationToggled(ItemTypeChanged),
    VisibilityToggled(ItemTypeChanged),
}

impl CatalogEvent {
    pub fn item_type_id(&self) -> &ItemTypeId {
        match self {
            CatalogEvent::ItemTypeCreated(e)
            | CatalogEvent::ItemTypeUpdated(e)
            | CatalogEvent::ActivationToggled(e)
            | CatalogEvent::VisibilityToggled(e) => &e.item_type_id,
        }
    }
}

impl Event for CatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::ItemTypeCreated(_) => "catalog.item_type.created",
            CatalogEvent::ItemTypeUpdated(_) => "catalog.item_type.updated",
            CatalogEvent::ActivationToggled(_) => "catalog.item_type.activation_toggled",
            CatalogEvent::VisibilityToggled(_) => "catalog.item_type.visibility_toggled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CatalogEvent::ItemTypeCreated(e)
            | CatalogEvent::ItemTypeUpdated(e)
            | CatalogEvent::ActivationToggled(e)
            | CatalogEvent::VisibilityToggled(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PackagingType;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn create_generates_id_when_absent() {
        let (item, event) = ItemType::create(NewItemType::named("جهاز", "Device"), now()).unwrap();
        assert!(item.id().as_str().starts_with("it_"));
        assert!(item.is_active());
        assert!(item.is_visible());
        assert_eq!(item.units_per_box(), 1);
        assert_eq!(event.item_type_id(), item.id());
        assert_eq!(event.event_type(), "catalog.item_type.created");
    }

    #[test]
    fn create_rejects_blank_names() {
        let err = ItemType::create(NewItemType::named("   ", "Device"), now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("nameLocal")));

        let err = ItemType::create(NewItemType::named("جهاز", ""), now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("nameAlt")));
    }

    #[test]
    fn create_rejects_malformed_id_and_bad_factor() {
        let mut input = NewItemType::named("a", "b");
        input.id = Some("has space".into());
        assert!(matches!(
            ItemType::create(input, now()),
            Err(DomainError::InvalidId(_))
        ));

        let mut input = NewItemType::named("a", "b");
        input.units_per_box = Some(0);
        assert!(matches!(
            ItemType::create(input, now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn patch_is_all_or_nothing() {
        let (mut item, _) = ItemType::create(NewItemType::named("a", "b"), now()).unwrap();
        let before = item.clone();

        let patch = ItemTypePatch {
            name_alt: Some("renamed".into()),
            units_per_box: Some(-3),
            ..Default::default()
        };
        assert!(item.apply_patch(patch, now()).is_err());
        assert_eq!(item, before);

        let patch = ItemTypePatch {
            name_alt: Some("renamed".into()),
            units_per_box: Some(25),
            ..Default::default()
        };
        item.apply_patch(patch, now()).unwrap();
        assert_eq!(item.name_alt(), "renamed");
        assert_eq!(item.units_per_box(), 25);
        assert_eq!(item.id(), before.id());
    }

    #[test]
    fn patch_with_id_field_is_refused_by_deserializer() {
        let raw = r#"{"id":"other","nameAlt":"x"}"#;
        assert!(serde_json::from_str::<ItemTypePatch>(raw).is_err());
    }

    #[test]
    fn display_total_uses_factor_only_for_box_rules() {
        let mut input = NewItemType::named("a", "b");
        input.units_per_box = Some(10);
        let (item, _) = ItemType::create(input, now()).unwrap();
        assert_eq!(item.display_total(3, 4), 34);

        let mut input = NewItemType::named("a", "b");
        input.packaging_rule = PackagingRule::UnitOnly;
        input.units_per_box = Some(10);
        let (item, _) = ItemType::create(input, now()).unwrap();
        assert_eq!(item.display_total(0, 4), 4);
        assert!(!item.packaging_rule().allows(PackagingType::Box));
    }

    #[test]
    fn toggles_only_touch_flags() {
        let (mut item, _) = ItemType::create(NewItemType::named("a", "b"), now()).unwrap();
        let spec_before = item.spec().clone();

        item.set_active(false, now());
        item.set_visible(false, now());

        assert!(!item.is_active());
        assert!(!item.is_visible());
        assert_eq!(item.name_local(), spec_before.name_local);
        assert_eq!(item.units_per_box(), spec_before.units_per_box);
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use stockline_catalog::{ItemType, ItemTypeId, PackagingType};
use stockline_inventory::{
    ChangeReason, InventoryRecord, LedgerEvent, LegacyStockFields, OwnerRef, ResolvedStock, StockSource, resolve,
};

use crate::error::ServiceError;
use crate::notify::{NotificationBus, STREAM_LEDGER, publish};
use crate::services::registry::load;
use crate::store::{StockStore, StockTx};

/// One resolved line of an owner's stock snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLine {
    pub item_type_id: ItemTypeId,
    pub boxes: i64,
    pub units: i64,
    pub source: StockSource,
    /// `boxes * unitsPerBox + units`; absent when the item type is not registered.
    pub display_total: Option<i64>,
}

/// Inventory ledger service: per-owner counters with legacy fallback.
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn StockStore>,
    bus: Arc<NotificationBus>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn StockStore>, bus: Arc<NotificationBus>) -> Self {
        Self { store, bus }
    }

    /// Effective stock for one owner/item pair. Never fails for a missing row;
    /// the zeroed record is returned instead.
    pub async fn get(&self, owner: OwnerRef, item_type_id: &ItemTypeId) -> Result<ResolvedStock, ServiceError> {
        let mut tx = self.store.begin().await?;
        resolve_in(&mut *tx, owner, item_type_id).await
    }

    /// Apply a signed delta to the counter named by `packaging`.
    #[instrument(skip(self), fields(owner = %owner, item_type_id = %item_type_id), err)]
    pub async fn adjust(
        &self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
        packaging: PackagingType,
        delta: i64,
    ) -> Result<InventoryRecord, ServiceError> {
        let mut tx = self.store.begin().await?;
        ensure_registered(&mut *tx, item_type_id).await?;
        let reason = ChangeReason::ManualAdjust { packaging, delta };
        let (record, event) = apply_delta(&mut *tx, owner, item_type_id, packaging, delta, reason, Utc::now()).await?;
        tx.commit().await?;

        publish(&self.bus, STREAM_LEDGER, event.stream_id(), &event);
        Ok(record)
    }

    /// Administrative overwrite of both counters. Bypasses transfer
    /// validation but still refuses negative values.
    #[instrument(skip(self), fields(owner = %owner, item_type_id = %item_type_id), err)]
    pub async fn set_absolute(
        &self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
        boxes: i64,
        units: i64,
    ) -> Result<InventoryRecord, ServiceError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        ensure_registered(&mut *tx, item_type_id).await?;

        let current = tx.lock_ledger_record(owner, item_type_id).await?;
        let record = current.set_absolute(boxes, units, now)?;
        tx.put_ledger_record(&record).await?;
        tx.commit().await?;

        tracing::info!(boxes, units, "ledger counters overwritten");
        let event = LedgerEvent::changed(&record, ChangeReason::ManualSet, now);
        publish(&self.bus, STREAM_LEDGER, event.stream_id(), &event);
        Ok(record)
    }

    /// Every item the owner holds, dynamic or legacy, in catalog order.
    pub async fn snapshot(&self, owner: OwnerRef) -> Result<Vec<StockLine>, ServiceError> {
        let mut tx = self.store.begin().await?;
        let catalog = tx.item_types().await?;

        let dynamic: BTreeMap<ItemTypeId, InventoryRecord> = tx
            .ledger_records(owner)
            .await?
            .into_iter()
            .map(|r| (r.item_type_id.clone(), r))
            .collect();
        let legacy: BTreeMap<_, _> = tx.legacy_entries(owner).await?.into_iter().collect();

        let mut ids: Vec<ItemTypeId> = Vec::new();
        let mut seen = BTreeSet::new();
        // Registered items first, in catalog order; strays after, by id.
        for item in &catalog {
            if dynamic.contains_key(item.id()) || legacy.contains_key(item.id()) {
                seen.insert(item.id().clone());
                ids.push(item.id().clone());
            }
        }
        let strays: BTreeSet<&ItemTypeId> = dynamic.keys().chain(legacy.keys()).filter(|id| !seen.contains(*id)).collect();
        ids.extend(strays.into_iter().cloned());

        let lines = ids
            .into_iter()
            .map(|id| {
                let resolved = resolve(owner, &id, dynamic.get(&id).cloned(), legacy.get(&id).copied());
                line(&catalog, resolved)
            })
            .collect();
        Ok(lines)
    }

    /// Store an owner's historical direct fields. They are read only when no
    /// dynamic record exists for the same item; returns how many pairs were stored.
    #[instrument(skip(self, fields), fields(owner = %owner), err)]
    pub async fn import_legacy(&self, owner: OwnerRef, fields: LegacyStockFields) -> Result<usize, ServiceError> {
        let entries = fields.into_counters()?;
        let now = Utc::now();

        let mut tx = self.store.begin().await?;
        let mut events = Vec::new();
        for (item_type_id, counters) in &entries {
            tx.put_legacy_counters(owner, item_type_id, *counters).await?;
            if tx.ledger_record(owner, item_type_id).await?.is_none() {
                let effective = InventoryRecord::with_counters(owner, item_type_id.clone(), *counters, None);
                events.push(LedgerEvent::changed(&effective, ChangeReason::LegacyImport, now));
            }
        }
        tx.commit().await?;

        tracing::info!(count = entries.len(), "legacy stock fields imported");
        for event in &events {
            publish(&self.bus, STREAM_LEDGER, event.stream_id(), event);
        }
        Ok(entries.len())
    }
}

fn line(catalog: &[ItemType], resolved: ResolvedStock) -> StockLine {
    let record = resolved.record;
    let display_total = catalog
        .iter()
        .find(|i| i.id() == &record.item_type_id)
        .map(|i| i.display_total(record.boxes, record.units));
    StockLine {
        item_type_id: record.item_type_id,
        boxes: record.boxes,
        units: record.units,
        source: resolved.source,
        display_total,
    }
}

async fn ensure_registered(tx: &mut dyn StockTx, item_type_id: &ItemTypeId) -> Result<(), ServiceError> {
    match load(tx, item_type_id).await {
        Err(ServiceError::NotFound(_)) => Err(ServiceError::validation(format!("unknown item type '{item_type_id}'"))),
        other => other.map(|_| ()),
    }
}

async fn resolve_in(
    tx: &mut dyn StockTx,
    owner: OwnerRef,
    item_type_id: &ItemTypeId,
) -> Result<ResolvedStock, ServiceError> {
    let dynamic = tx.ledger_record(owner, item_type_id).await?;
    let legacy = match dynamic {
        Some(_) => None,
        None => tx.legacy_counters(owner, item_type_id).await?,
    };
    Ok(resolve(owner, item_type_id, dynamic, legacy))
}

/// Apply one delta inside an open unit of work.
///
/// The baseline is the locked dynamic record, materialized from the legacy
/// field when missing; from then on it shadows the legacy value. The unit of
/// work must be dropped when the delta would drive the counter negative.
pub(crate) async fn apply_delta(
    tx: &mut dyn StockTx,
    owner: OwnerRef,
    item_type_id: &ItemTypeId,
    packaging: PackagingType,
    delta: i64,
    reason: ChangeReason,
    now: DateTime<Utc>,
) -> Result<(InventoryRecord, LedgerEvent), ServiceError> {
    let current = tx.lock_ledger_record(owner, item_type_id).await?;
    let record = current.adjusted(packaging, delta, now).inspect_err(|err| {
        tracing::debug!(%owner, %item_type_id, delta, error = %err, "ledger adjustment refused");
    })?;
    tx.put_ledger_record(&record).await?;

    let event = LedgerEvent::changed(&record, reason, now);
    Ok((record, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::registry::ItemTypeRegistry;
    use crate::store::InMemoryStockStore;
    use stockline_catalog::ItemTypePatch;
    use stockline_core::{TechnicianId, WarehouseId};
    use stockline_events::EventBus;

    async fn seeded() -> (InventoryLedger, Arc<NotificationBus>) {
        let store: Arc<dyn StockStore> = Arc::new(InMemoryStockStore::new());
        let bus = Arc::new(NotificationBus::new());
        ItemTypeRegistry::new(store.clone(), bus.clone())
            .seed_defaults()
            .await
            .unwrap();
        (InventoryLedger::new(store, bus.clone()), bus)
    }

    fn n950() -> ItemTypeId {
        ItemTypeId::parse("n950").unwrap()
    }

    #[tokio::test]
    async fn get_returns_zeroed_record_when_absent() {
        let (ledger, _) = seeded().await;
        let owner = OwnerRef::warehouse(WarehouseId::new());

        let resolved = ledger.get(owner, &n950()).await.unwrap();
        assert_eq!(resolved.source, StockSource::Empty);
        assert_eq!((resolved.record.boxes, resolved.record.units), (0, 0));
    }

    #[tokio::test]
    async fn negative_adjust_leaves_record_unchanged() {
        let (ledger, _) = seeded().await;
        let owner = OwnerRef::warehouse(WarehouseId::new());
        ledger.set_absolute(owner, &n950(), 2, 5).await.unwrap();

        let err = ledger
            .adjust(owner, &n950(), PackagingType::Box, -3)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::InsufficientStock {
                available: 2,
                requested: 3
            }
        );
        let record = ledger.get(owner, &n950()).await.unwrap().record;
        assert_eq!((record.boxes, record.units), (2, 5));
    }

    #[tokio::test]
    async fn unknown_item_type_is_a_validation_error() {
        let (ledger, _) = seeded().await;
        let owner = OwnerRef::warehouse(WarehouseId::new());
        let ghost = ItemTypeId::parse("ghost").unwrap();

        assert!(matches!(
            ledger.adjust(owner, &ghost, PackagingType::Unit, 1).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            ledger.set_absolute(owner, &ghost, 1, 1).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn set_absolute_rejects_negative_counters() {
        let (ledger, _) = seeded().await;
        let owner = OwnerRef::technician_fixed(TechnicianId::new());
        assert!(matches!(
            ledger.set_absolute(owner, &n950(), -1, 0).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn legacy_value_is_read_until_a_dynamic_record_exists() {
        let (ledger, _) = seeded().await;
        let owner = OwnerRef::warehouse(WarehouseId::new());
        let legacy = LegacyStockFields {
            n950_boxes: Some(4),
            stc_sim_units: Some(30),
            ..Default::default()
        };
        assert_eq!(ledger.import_legacy(owner, legacy).await.unwrap(), 2);

        let resolved = ledger.get(owner, &n950()).await.unwrap();
        assert_eq!(resolved.source, StockSource::Legacy);
        assert_eq!(resolved.record.boxes, 4);

        ledger.adjust(owner, &n950(), PackagingType::Box, 1).await.unwrap();
        let resolved = ledger.get(owner, &n950()).await.unwrap();
        assert_eq!(resolved.source, StockSource::Dynamic);
        // Baseline was the legacy value; the two are never summed afterwards.
        assert_eq!(resolved.record.boxes, 5);
    }

    #[tokio::test]
    async fn refused_adjust_on_legacy_stock_leaves_no_dynamic_row() {
        let (ledger, _) = seeded().await;
        let owner = OwnerRef::warehouse(WarehouseId::new());
        let legacy = LegacyStockFields {
            n950_boxes: Some(2),
            ..Default::default()
        };
        ledger.import_legacy(owner, legacy).await.unwrap();

        let err = ledger
            .adjust(owner, &n950(), PackagingType::Box, -3)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::InsufficientStock {
                available: 2,
                requested: 3
            }
        );
        let resolved = ledger.get(owner, &n950()).await.unwrap();
        assert_eq!(resolved.source, StockSource::Legacy);
        assert_eq!(resolved.record.boxes, 2);
    }

    #[tokio::test]
    async fn units_per_box_change_only_moves_display_total() {
        let store: Arc<dyn StockStore> = Arc::new(InMemoryStockStore::new());
        let bus = Arc::new(NotificationBus::new());
        let registry = ItemTypeRegistry::new(store.clone(), bus.clone());
        registry.seed_defaults().await.unwrap();
        let ledger = InventoryLedger::new(store, bus);
        let owner = OwnerRef::warehouse(WarehouseId::new());
        ledger.set_absolute(owner, &n950(), 3, 4).await.unwrap();
        let before = ledger.snapshot(owner).await.unwrap()[0].display_total;

        registry
            .update(
                &n950(),
                ItemTypePatch {
                    units_per_box: Some(25),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = ledger.get(owner, &n950()).await.unwrap().record;
        assert_eq!((record.boxes, record.units), (3, 4));
        let after = ledger.snapshot(owner).await.unwrap()[0].display_total;
        assert_eq!(after, Some(3 * 25 + 4));
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn snapshot_lists_dynamic_and_legacy_lines_in_catalog_order() {
        let (ledger, _) = seeded().await;
        let owner = OwnerRef::technician_moving(TechnicianId::new());
        ledger
            .import_legacy(
                owner,
                LegacyStockFields {
                    stc_sim_boxes: Some(1),
                    stc_sim_units: Some(7),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        ledger.set_absolute(owner, &n950(), 2, 1).await.unwrap();

        let lines = ledger.snapshot(owner).await.unwrap();
        let ids: Vec<&str> = lines.iter().map(|l| l.item_type_id.as_str()).collect();
        assert_eq!(ids, vec!["n950", "stcSim"]);

        let stc = &lines[1];
        assert_eq!(stc.source, StockSource::Legacy);
        assert_eq!(stc.display_total, Some(107));
        assert_eq!(lines[0].source, StockSource::Dynamic);
    }

    #[tokio::test]
    async fn writes_publish_ledger_changed() {
        let (ledger, bus) = seeded().await;
        let sub = bus.subscribe();
        let owner = OwnerRef::warehouse(WarehouseId::new());

        ledger.set_absolute(owner, &n950(), 10, 0).await.unwrap();
        let _ = ledger.adjust(owner, &n950(), PackagingType::Unit, -1).await;

        let published = sub.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type(), "inventory.ledger.changed");
        assert_eq!(published[0].stream_id(), format!("{owner}/n950"));
    }
}

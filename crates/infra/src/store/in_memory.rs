use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockline_catalog::{ItemType, ItemTypeId};
use stockline_core::{ExpectedVersion, TransferId};
use stockline_inventory::{InventoryRecord, OwnerRef, StockCounters};
use stockline_transfers::TransferRecord;

use super::{StockStore, StockTx, StoreError, TransferFilter};

type LedgerKey = (OwnerRef, ItemTypeId);

#[derive(Debug, Clone, Default)]
struct State {
    item_types: BTreeMap<ItemTypeId, ItemType>,
    ledger: HashMap<LedgerKey, InventoryRecord>,
    legacy: HashMap<LedgerKey, StockCounters>,
    transfers: HashMap<TransferId, TransferRecord>,
}

/// In-memory store (dev/tests).
///
/// A unit of work holds the only lock on the state until it commits or is
/// dropped. Writes go to a private copy that replaces the shared state on
/// commit, so a dropped unit of work leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn begin(&self) -> Result<Box<dyn StockTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(InMemoryTx { guard, work }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    work: State,
}

#[async_trait]
impl StockTx for InMemoryTx {
    async fn item_type(&mut self, id: &ItemTypeId) -> Result<Option<ItemType>, StoreError> {
        Ok(self.work.item_types.get(id).cloned())
    }

    async fn item_types(&mut self) -> Result<Vec<ItemType>, StoreError> {
        let mut items: Vec<ItemType> = self.work.item_types.values().cloned().collect();
        // BTreeMap already yields id order; a stable sort keeps it within a sort_order.
        items.sort_by_key(|i| i.sort_order());
        Ok(items)
    }

    async fn insert_item_type(&mut self, item: &ItemType) -> Result<(), StoreError> {
        if self.work.item_types.contains_key(item.id()) {
            return Err(StoreError::Conflict(format!(
                "item type '{}' already exists",
                item.id()
            )));
        }
        self.work.item_types.insert(item.id().clone(), item.clone());
        Ok(())
    }

    async fn update_item_type(&mut self, item: &ItemType) -> Result<(), StoreError> {
        match self.work.item_types.get_mut(item.id()) {
            Some(slot) => {
                *slot = item.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "item type '{}' vanished before update",
                item.id()
            ))),
        }
    }

    async fn ledger_record(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self
            .work
            .ledger
            .get(&(owner, item_type_id.clone()))
            .cloned())
    }

    async fn lock_ledger_record(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
    ) -> Result<InventoryRecord, StoreError> {
        let key = (owner, item_type_id.clone());
        let legacy = self.work.legacy.get(&key).copied().unwrap_or_default();
        let record = self
            .work
            .ledger
            .entry(key)
            .or_insert_with(|| InventoryRecord::with_counters(owner, item_type_id.clone(), legacy, None));
        Ok(record.clone())
    }

    async fn ledger_records(&mut self, owner: OwnerRef) -> Result<Vec<InventoryRecord>, StoreError> {
        let mut records: Vec<InventoryRecord> = self
            .work
            .ledger
            .values()
            .filter(|r| r.owner() == owner)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.item_type_id.cmp(&b.item_type_id));
        Ok(records)
    }

    async fn put_ledger_record(&mut self, record: &InventoryRecord) -> Result<(), StoreError> {
        self.work
            .ledger
            .insert((record.owner(), record.item_type_id.clone()), record.clone());
        Ok(())
    }

    async fn legacy_counters(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
    ) -> Result<Option<StockCounters>, StoreError> {
        Ok(self.work.legacy.get(&(owner, item_type_id.clone())).copied())
    }

    async fn legacy_entries(
        &mut self,
        owner: OwnerRef,
    ) -> Result<Vec<(ItemTypeId, StockCounters)>, StoreError> {
        let mut entries: Vec<(ItemTypeId, StockCounters)> = self
            .work
            .legacy
            .iter()
            .filter(|((o, _), _)| *o == owner)
            .map(|((_, item), counters)| (item.clone(), *counters))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    async fn put_legacy_counters(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
        counters: StockCounters,
    ) -> Result<(), StoreError> {
        self.work
            .legacy
            .insert((owner, item_type_id.clone()), counters);
        Ok(())
    }

    async fn transfer(&mut self, id: TransferId) -> Result<Option<TransferRecord>, StoreError> {
        Ok(self.work.transfers.get(&id).cloned())
    }

    async fn insert_transfer(&mut self, row: &TransferRecord) -> Result<(), StoreError> {
        if self.work.transfers.contains_key(&row.id) {
            return Err(StoreError::Conflict(format!("transfer {} already exists", row.id)));
        }
        self.work.transfers.insert(row.id, row.clone());
        Ok(())
    }

    async fn update_transfer(
        &mut self,
        row: &TransferRecord,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let slot = self
            .work
            .transfers
            .get_mut(&row.id)
            .ok_or_else(|| StoreError::Conflict(format!("transfer {} no longer exists", row.id)))?;

        if !expected.matches(slot.version) {
            return Err(StoreError::Conflict(format!(
                "transfer {}: expected {expected:?}, found version {}",
                row.id, slot.version
            )));
        }
        *slot = row.clone();
        Ok(())
    }

    async fn transfers(&mut self, filter: &TransferFilter) -> Result<Vec<TransferRecord>, StoreError> {
        let mut rows: Vec<TransferRecord> = self
            .work
            .transfers
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn delete_transfers(&mut self, ids: &[TransferId]) -> Result<u64, StoreError> {
        let removed = ids
            .iter()
            .filter(|id| self.work.transfers.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockline_core::WarehouseId;

    fn n950() -> ItemTypeId {
        ItemTypeId::parse("n950").unwrap()
    }

    #[tokio::test]
    async fn dropped_unit_of_work_discards_writes() {
        let store = InMemoryStockStore::new();
        let owner = OwnerRef::warehouse(WarehouseId::new());
        let record = InventoryRecord::zeroed(owner, n950())
            .set_absolute(10, 0, Utc::now())
            .unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.put_ledger_record(&record).await.unwrap();
            // no commit
        }

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.ledger_record(owner, &n950()).await.unwrap(), None);
        tx.put_ledger_record(&record).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.ledger_record(owner, &n950()).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn second_unit_of_work_waits_for_the_first() {
        let store = InMemoryStockStore::new();
        let first = store.begin().await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move { store.begin().await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap().unwrap();
    }
}

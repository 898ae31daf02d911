//! Storage boundary.
//!
//! Every service operation runs inside exactly one unit of work: `begin()` a
//! `StockTx`, read and write through it, then `commit()`. Dropping a `StockTx`
//! without committing discards everything it wrote, so an error returned with
//! `?` halfway through an operation never leaves a partial change behind.
//!
//! Two backends implement this boundary:
//! - `InMemoryStockStore`: a single async mutex held for the lifetime of the
//!   unit of work (serializable by construction).
//! - `PostgresStockStore`: a database transaction with row locks on the
//!   transfer and ledger rows it is about to change.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use stockline_catalog::{ItemType, ItemTypeId};
use stockline_core::{ExpectedVersion, TechnicianId, TransferId, WarehouseId};
use stockline_inventory::{InventoryRecord, OwnerRef, StockCounters};
use stockline_transfers::{TransferRecord, TransferStatus};

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;

/// Storage-level failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Uniqueness or optimistic version check failed.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// Connectivity failures, malformed rows and other backend errors.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Filter for transfer listings. Empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferFilter {
    pub technician_id: Option<TechnicianId>,
    pub warehouse_id: Option<WarehouseId>,
    pub status: Option<TransferStatus>,
}

impl TransferFilter {
    pub fn matches(&self, row: &TransferRecord) -> bool {
        self.technician_id.is_none_or(|t| t == row.technician_id)
            && self.warehouse_id.is_none_or(|w| w == row.warehouse_id)
            && self.status.is_none_or(|s| s == row.status)
    }
}

/// Factory for units of work.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StockTx>, StoreError>;
}

/// One unit of work over item types, ledger rows, legacy fields and transfers.
#[async_trait]
pub trait StockTx: Send {
    // --- item types ---

    async fn item_type(&mut self, id: &ItemTypeId) -> Result<Option<ItemType>, StoreError>;

    /// Every item type, ordered by `sort_order` then id.
    async fn item_types(&mut self) -> Result<Vec<ItemType>, StoreError>;

    /// Fails `Conflict` if the id is taken.
    async fn insert_item_type(&mut self, item: &ItemType) -> Result<(), StoreError>;

    async fn update_item_type(&mut self, item: &ItemType) -> Result<(), StoreError>;

    // --- ledger ---

    /// The dynamic record, if any. Takes no row lock.
    async fn ledger_record(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
    ) -> Result<Option<InventoryRecord>, StoreError>;

    /// The dynamic record, locked for the rest of the unit of work.
    ///
    /// A missing record is first materialized from the legacy field, or from
    /// zero, so concurrent writers always queue on the same row. The
    /// materialized row is discarded with the unit of work if it never commits.
    async fn lock_ledger_record(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
    ) -> Result<InventoryRecord, StoreError>;

    async fn ledger_records(&mut self, owner: OwnerRef) -> Result<Vec<InventoryRecord>, StoreError>;

    /// Insert or overwrite.
    async fn put_ledger_record(&mut self, record: &InventoryRecord) -> Result<(), StoreError>;

    // --- legacy direct fields ---

    async fn legacy_counters(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
    ) -> Result<Option<StockCounters>, StoreError>;

    async fn legacy_entries(
        &mut self,
        owner: OwnerRef,
    ) -> Result<Vec<(ItemTypeId, StockCounters)>, StoreError>;

    async fn put_legacy_counters(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
        counters: StockCounters,
    ) -> Result<(), StoreError>;

    // --- transfers ---

    /// The transfer row, locked for the rest of the unit of work.
    async fn transfer(&mut self, id: TransferId) -> Result<Option<TransferRecord>, StoreError>;

    async fn insert_transfer(&mut self, row: &TransferRecord) -> Result<(), StoreError>;

    /// Overwrite a transfer row. `expected` is checked against the stored
    /// version; `row.version` is the version written.
    async fn update_transfer(
        &mut self,
        row: &TransferRecord,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    /// Matching rows, newest first.
    async fn transfers(&mut self, filter: &TransferFilter) -> Result<Vec<TransferRecord>, StoreError>;

    /// Hard-delete; returns how many rows existed.
    async fn delete_transfers(&mut self, ids: &[TransferId]) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockline_catalog::PackagingType;
    use stockline_core::ActorId;

    #[test]
    fn filter_combines_fields_with_and() {
        let tech = TechnicianId::new();
        let row = TransferRecord {
            id: TransferId::new(),
            warehouse_id: WarehouseId::new(),
            technician_id: tech,
            item_type_id: ItemTypeId::parse("n950").unwrap(),
            packaging_type: PackagingType::Box,
            quantity: 1,
            performed_by: ActorId::new(),
            notes: None,
            status: TransferStatus::Pending,
            rejection_reason: None,
            created_at: Utc::now(),
            responded_at: None,
            version: 1,
        };

        assert!(TransferFilter::default().matches(&row));
        let by_tech = TransferFilter {
            technician_id: Some(tech),
            ..Default::default()
        };
        assert!(by_tech.matches(&row));

        let mismatched = TransferFilter {
            technician_id: Some(tech),
            status: Some(TransferStatus::Accepted),
            ..Default::default()
        };
        assert!(!mismatched.matches(&row));
    }
}

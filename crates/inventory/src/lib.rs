//! Inventory ledger domain.
//!
//! Quantity records keyed by `(ownerKind, ownerId, itemTypeId)`, each holding
//! two independent counters (`boxes`, `units`). Pure arithmetic and
//! resolution rules only; persistence and atomicity live in the infra crate.

pub mod legacy;
pub mod ledger;
pub mod owner;

pub use ledger::{
    ChangeReason, InventoryRecord, LedgerChanged, LedgerEvent, ResolvedStock, StockCounters,
    StockSource, resolve,
};
pub use legacy::LegacyStockFields;
pub use owner::{OwnerKind, OwnerRef};

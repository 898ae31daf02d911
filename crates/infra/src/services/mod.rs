//! Application services. Each public operation opens one unit of work on the
//! store, commits it, and only then publishes its notifications.

pub mod ledger;
pub mod lifecycle;
pub mod registry;

pub use ledger::{InventoryLedger, StockLine};
pub use lifecycle::{TransferDraft, TransferLifecycleManager};
pub use registry::{ItemTypeQuery, ItemTypeRegistry, SeedOutcome};

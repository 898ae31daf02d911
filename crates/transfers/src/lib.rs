//! Warehouse → technician transfer requests.
//!
//! - `request`: the `TransferRequest` aggregate (pending → accepted | rejected).
//! - `grouping`: read-time reconstruction of business operations from
//!   processed transfer rows.
//!
//! Ledger mutation on accept is orchestrated by the lifecycle service in
//! `stockline-infra`; this crate stays pure.

pub mod grouping;
pub mod request;

pub use grouping::{GroupKey, Operation, OperationItem, calendar_day, group_operations};
pub use request::{
    AcceptTransfer, ItemTypeGate, RejectTransfer, SubmitTransfer, TransferAccepted,
    TransferCommand, TransferEvent, TransferRecord, TransferRejected, TransferRequest,
    TransferStatus, TransferSubmitted, normalize_notes,
};

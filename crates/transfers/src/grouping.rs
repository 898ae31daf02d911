//! Operation grouping.
//!
//! Several transfer rows produced by one human action (a warehouse keeper
//! sending a technician three item types at once) are reconstructed into a
//! single `Operation` for audit and export. Operations are derived on every
//! query and never stored.
//!
//! Rows are grouped on `(warehouse, technician, calendar day, performer,
//! status, notes)`. Two distinct actions that agree on every one of those
//! fields collapse into one operation; each operation therefore keeps the ids
//! of its member rows so a reader can always expand it.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use stockline_catalog::{ItemTypeId, PackagingType};
use stockline_core::{ActorId, TechnicianId, TransferId, WarehouseId};

use crate::request::{TransferRecord, TransferStatus, normalize_notes};

/// Calendar day of `at` as seen from `offset`.
pub fn calendar_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Grouping key. `notes: None` is the "no notes" sentinel; blank notes map to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    pub warehouse_id: WarehouseId,
    pub technician_id: TechnicianId,
    pub day: NaiveDate,
    pub performed_by: ActorId,
    pub status: TransferStatus,
    pub notes: Option<String>,
}

impl GroupKey {
    fn of(row: &TransferRecord, offset: FixedOffset) -> Self {
        Self {
            warehouse_id: row.warehouse_id,
            technician_id: row.technician_id,
            day: calendar_day(row.created_at, offset),
            performed_by: row.performed_by,
            status: row.status,
            notes: normalize_notes(row.notes.as_deref()),
        }
    }

    /// Stable textual form, usable as an identifier by export tooling.
    pub fn render(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.warehouse_id,
            self.technician_id,
            self.day,
            self.performed_by,
            self.status,
            self.notes.as_deref().unwrap_or("-")
        )
    }
}

/// One line of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationItem {
    pub transfer_id: TransferId,
    pub item_type_id: ItemTypeId,
    pub packaging_type: PackagingType,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub group_key: String,
    #[serde(flatten)]
    pub header: GroupKey,
    pub items: Vec<OperationItem>,
    pub total_quantity: i64,
}

impl Operation {
    pub fn transfer_ids(&self) -> impl Iterator<Item = TransferId> + '_ {
        self.items.iter().map(|i| i.transfer_id)
    }
}

/// Group processed transfer rows into operations.
///
/// Pending rows are skipped. Groups come out newest day first, then by key, so
/// the result does not depend on input order; items inside a group keep input
/// order.
pub fn group_operations<'a, I>(rows: I, offset: FixedOffset) -> Vec<Operation>
where
    I: IntoIterator<Item = &'a TransferRecord>,
{
    let mut groups: BTreeMap<GroupKey, Vec<OperationItem>> = BTreeMap::new();

    for row in rows {
        if !row.status.is_terminal() {
            continue;
        }
        groups
            .entry(GroupKey::of(row, offset))
            .or_default()
            .push(OperationItem {
                transfer_id: row.id,
                item_type_id: row.item_type_id.clone(),
                packaging_type: row.packaging_type,
                quantity: row.quantity,
            });
    }

    let mut out: Vec<Operation> = groups
        .into_iter()
        .map(|(header, items)| Operation {
            group_key: header.render(),
            total_quantity: items.iter().fold(0i64, |acc, i| acc.saturating_add(i.quantity)),
            header,
            items,
        })
        .collect();

    // BTreeMap order is ascending by key; flip only the day component.
    out.sort_by(|a, b| {
        b.header
            .day
            .cmp(&a.header.day)
            .then_with(|| a.header.cmp(&b.header))
    });
    out
}

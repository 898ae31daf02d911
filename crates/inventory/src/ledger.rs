use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_catalog::{ItemTypeId, PackagingType};
use stockline_core::{DomainError, DomainResult, TransferId};
use stockline_events::Event;

use crate::owner::{OwnerKind, OwnerRef};

/// The two independent counters of a ledger record.
///
/// Never collapsed into one another: a conversion factor is only ever applied
/// when computing a display total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockCounters {
    pub boxes: i64,
    pub units: i64,
}

impl StockCounters {
    pub fn new(boxes: i64, units: i64) -> DomainResult<Self> {
        if boxes < 0 || units < 0 {
            return Err(DomainError::validation("boxes and units cannot be negative"));
        }
        Ok(Self { boxes, units })
    }

    pub fn get(&self, packaging: PackagingType) -> i64 {
        match packaging {
            PackagingType::Box => self.boxes,
            PackagingType::Unit => self.units,
        }
    }

    /// Counters after moving `delta` on the `packaging` counter.
    ///
    /// Fails with `InsufficientStock` if that counter would go negative; the
    /// other counter is never consulted or touched.
    pub fn with_delta(self, packaging: PackagingType, delta: i64) -> DomainResult<Self> {
        let current = self.get(packaging);
        let next = current
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("counter overflow"))?;
        if next < 0 {
            return Err(DomainError::insufficient_stock(current, -delta));
        }

        let mut out = self;
        match packaging {
            PackagingType::Box => out.boxes = next,
            PackagingType::Unit => out.units = next,
        }
        Ok(out)
    }

    pub fn is_zero(&self) -> bool {
        self.boxes == 0 && self.units == 0
    }
}

/// One ledger row: `(ownerKind, ownerId, itemTypeId) -> (boxes, units)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub owner_kind: OwnerKind,
    pub owner_id: uuid::Uuid,
    pub item_type_id: ItemTypeId,
    pub boxes: i64,
    pub units: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl InventoryRecord {
    /// The record returned for an owner/item pair that was never written.
    pub fn zeroed(owner: OwnerRef, item_type_id: ItemTypeId) -> Self {
        Self::with_counters(owner, item_type_id, StockCounters::default(), None)
    }

    pub fn with_counters(
        owner: OwnerRef,
        item_type_id: ItemTypeId,
        counters: StockCounters,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            owner_kind: owner.kind,
            owner_id: owner.id,
            item_type_id,
            boxes: counters.boxes,
            units: counters.units,
            updated_at,
        }
    }

    pub fn owner(&self) -> OwnerRef {
        OwnerRef::new(self.owner_kind, self.owner_id)
    }

    pub fn counters(&self) -> StockCounters {
        StockCounters {
            boxes: self.boxes,
            units: self.units,
        }
    }

    /// A copy of this record with `delta` applied; `self` is left as-is.
    pub fn adjusted(&self, packaging: PackagingType, delta: i64, now: DateTime<Utc>) -> DomainResult<Self> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        let counters = self.counters().with_delta(packaging, delta)?;
        Ok(Self::with_counters(self.owner(), self.item_type_id.clone(), counters, Some(now)))
    }

    /// A copy of this record with both counters overwritten.
    pub fn set_absolute(&self, boxes: i64, units: i64, now: DateTime<Utc>) -> DomainResult<Self> {
        let counters = StockCounters::new(boxes, units)?;
        Ok(Self::with_counters(self.owner(), self.item_type_id.clone(), counters, Some(now)))
    }

    /// Stream id used when publishing changes to this record.
    pub fn stream_id(&self) -> String {
        format!("{}/{}", self.owner(), self.item_type_id)
    }
}

/// Where a resolved quantity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockSource {
    /// A dynamic `(owner, itemType)` row exists and is authoritative.
    Dynamic,
    /// No dynamic row; the owner's historical direct field was read.
    Legacy,
    /// Neither exists; zeroed.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStock {
    pub record: InventoryRecord,
    pub source: StockSource,
}

/// Resolve the effective quantity for one owner/item pair.
///
/// A dynamic record always wins; the legacy value is read only when no dynamic
/// record exists. The two are never summed.
pub fn resolve(
    owner: OwnerRef,
    item_type_id: &ItemTypeId,
    dynamic: Option<InventoryRecord>,
    legacy: Option<StockCounters>,
) -> ResolvedStock {
    match (dynamic, legacy) {
        (Some(record), _) => ResolvedStock {
            record,
            source: StockSource::Dynamic,
        },
        (None, Some(counters)) => ResolvedStock {
            record: InventoryRecord::with_counters(owner, item_type_id.clone(), counters, None),
            source: StockSource::Legacy,
        },
        (None, None) => ResolvedStock {
            record: InventoryRecord::zeroed(owner, item_type_id.clone()),
            source: StockSource::Empty,
        },
    }
}

/// Why a ledger record changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeReason {
    TransferAccepted {
        transfer_id: TransferId,
        packaging: PackagingType,
        delta: i64,
    },
    ManualAdjust {
        packaging: PackagingType,
        delta: i64,
    },
    ManualSet,
    LegacyImport,
}

/// Event: LedgerChanged ("ledger changed for ownerId/itemTypeId").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerChanged {
    pub owner: OwnerRef,
    pub item_type_id: ItemTypeId,
    pub boxes: i64,
    pub units: i64,
    pub reason: ChangeReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    LedgerChanged(LedgerChanged),
}

impl LedgerEvent {
    pub fn changed(record: &InventoryRecord, reason: ChangeReason, occurred_at: DateTime<Utc>) -> Self {
        LedgerEvent::LedgerChanged(LedgerChanged {
            owner: record.owner(),
            item_type_id: record.item_type_id.clone(),
            boxes: record.boxes,
            units: record.units,
            reason,
            occurred_at,
        })
    }

    pub fn stream_id(&self) -> String {
        match self {
            LedgerEvent::LedgerChanged(e) => format!("{}/{}", e.owner, e.item_type_id),
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::LedgerChanged(_) => "inventory.ledger.changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::LedgerChanged(e) => e.occurred_at,
        }
    }
}

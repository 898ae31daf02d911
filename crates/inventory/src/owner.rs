use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockline_core::{DomainError, TechnicianId, WarehouseId};

/// Who holds a ledger record.
///
/// A technician owns two disjoint inventories: `TechnicianFixed` (base-assigned
/// stock) and `TechnicianMoving` (stock accepted from warehouse transfers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OwnerKind {
    Warehouse,
    TechnicianFixed,
    TechnicianMoving,
}

impl OwnerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OwnerKind::Warehouse => "warehouse",
            OwnerKind::TechnicianFixed => "technicianFixed",
            OwnerKind::TechnicianMoving => "technicianMoving",
        }
    }
}

impl core::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "warehouse" => Ok(OwnerKind::Warehouse),
            "technicianFixed" | "technician-fixed" | "fixed" => Ok(OwnerKind::TechnicianFixed),
            "technicianMoving" | "technician-moving" | "moving" => Ok(OwnerKind::TechnicianMoving),
            other => Err(DomainError::validation(format!(
                "owner kind must be one of: warehouse, technicianFixed, technicianMoving (got '{other}')"
            ))),
        }
    }
}

/// Fully-qualified ledger owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub kind: OwnerKind,
    pub id: Uuid,
}

impl OwnerRef {
    pub fn new(kind: OwnerKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn warehouse(id: WarehouseId) -> Self {
        Self::new(OwnerKind::Warehouse, id.into())
    }

    pub fn technician_fixed(id: TechnicianId) -> Self {
        Self::new(OwnerKind::TechnicianFixed, id.into())
    }

    pub fn technician_moving(id: TechnicianId) -> Self {
        Self::new(OwnerKind::TechnicianMoving, id.into())
    }
}

impl core::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

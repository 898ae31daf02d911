use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockline_catalog::{ItemTypeId, PackagingType};
use stockline_core::{DomainError, TransferId};
use stockline_infra::services::{ItemTypeQuery, StockLine, TransferDraft};
use stockline_infra::store::TransferFilter;
use stockline_infra::ServiceError;
use stockline_inventory::{OwnerKind, OwnerRef};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub warehouse_id: String,
    pub technician_id: String,
    pub item_type_id: String,
    pub packaging_type: String,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateTransferRequest {
    pub fn into_draft(self) -> Result<TransferDraft, ServiceError> {
        Ok(TransferDraft {
            warehouse_id: parse(&self.warehouse_id)?,
            technician_id: parse(&self.technician_id)?,
            item_type_id: ItemTypeId::parse(&self.item_type_id)?,
            packaging_type: PackagingType::from_str(&self.packaging_type)?,
            quantity: self.quantity,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectTransferRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTransfersRequest {
    pub ids: Vec<String>,
}

impl DeleteTransfersRequest {
    pub fn transfer_ids(&self) -> Result<Vec<TransferId>, ServiceError> {
        self.ids.iter().map(|raw| parse(raw)).collect()
    }
}

/// `?technicianId=&warehouseId=&status=`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferListQuery {
    pub technician_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub status: Option<String>,
}

impl TransferListQuery {
    pub fn into_filter(self) -> Result<TransferFilter, ServiceError> {
        Ok(TransferFilter {
            technician_id: self.technician_id.as_deref().map(parse).transpose()?,
            warehouse_id: self.warehouse_id.as_deref().map(parse).transpose()?,
            status: self.status.as_deref().map(parse).transpose()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTypeListQuery {
    #[serde(default)]
    pub active_only: bool,
    #[serde(default)]
    pub visible_only: bool,
}

impl From<ItemTypeListQuery> for ItemTypeQuery {
    fn from(q: ItemTypeListQuery) -> Self {
        ItemTypeQuery {
            active_only: q.active_only,
            visible_only: q.visible_only,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleVisibilityRequest {
    pub is_visible: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub boxes: i64,
    pub units: i64,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshotResponse {
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub lines: Vec<StockLine>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse a path/body value with the domain's own `FromStr`.
pub fn parse<T>(raw: &str) -> Result<T, ServiceError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(ServiceError::from)
}

pub fn owner(kind: &str, id: &str) -> Result<OwnerRef, ServiceError> {
    let kind: OwnerKind = parse(kind)?;
    let id = Uuid::parse_str(id.trim()).map_err(|_| ServiceError::InvalidId(format!("owner id '{id}'")))?;
    Ok(OwnerRef::new(kind, id))
}

/// Unwrap a JSON body, turning extractor rejections into the common error shape.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text()))
}

/// Decode a body that may be omitted entirely. An empty body is `None`;
/// anything else must be valid JSON for `T`.
pub fn optional_body<T: DeserializeOwned>(raw: &[u8]) -> Result<Option<T>, axum::response::Response> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(raw)
        .map(Some)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", format!("invalid JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_transfers::TransferStatus;

    #[test]
    fn list_query_parses_every_field() {
        let tech = stockline_core::TechnicianId::new();
        let filter = TransferListQuery {
            technician_id: Some(tech.to_string()),
            warehouse_id: None,
            status: Some("accepted".into()),
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.technician_id, Some(tech));
        assert_eq!(filter.status, Some(TransferStatus::Accepted));

        let bad = TransferListQuery {
            warehouse_id: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(bad.into_filter(), Err(ServiceError::InvalidId(_))));
    }

    #[test]
    fn owner_path_accepts_kind_aliases() {
        let id = Uuid::now_v7();
        let parsed = owner("moving", &id.to_string()).unwrap();
        assert_eq!(parsed.kind, OwnerKind::TechnicianMoving);
        assert!(owner("depot", &id.to_string()).is_err());
        assert!(matches!(owner("warehouse", "42"), Err(ServiceError::InvalidId(_))));
    }

    #[test]
    fn optional_body_distinguishes_missing_from_malformed() {
        assert!(optional_body::<RejectTransferRequest>(b"").unwrap().is_none());
        assert!(optional_body::<RejectTransferRequest>(b"  \n").unwrap().is_none());

        let parsed = optional_body::<RejectTransferRequest>(br#"{"reason":"late"}"#).unwrap();
        assert_eq!(parsed.and_then(|b| b.reason).as_deref(), Some("late"));

        let resp = optional_body::<RejectTransferRequest>(b"{reason").unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

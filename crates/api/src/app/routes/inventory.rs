use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockline_catalog::ItemTypeId;
use stockline_inventory::LegacyStockFields;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/:owner_kind/:owner_id", get(get_snapshot))
        .route("/:owner_kind/:owner_id/legacy", post(import_legacy))
        .route("/:owner_kind/:owner_id/:item_type_id", get(get_stock).put(set_stock))
}

/// Every item the owner holds, resolved through the legacy fallback.
pub async fn get_snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    Path((kind, id)): Path<(String, String)>,
) -> axum::response::Response {
    let owner = match dto::owner(&kind, &id) {
        Ok(o) => o,
        Err(e) => return errors::service_error_to_response(e),
    };

    match services.ledger.snapshot(owner).await {
        Ok(lines) => Json(dto::InventorySnapshotResponse {
            owner_kind: owner.kind,
            owner_id: owner.id,
            lines,
        })
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path((kind, id, item)): Path<(String, String, String)>,
) -> axum::response::Response {
    let (owner, item_type_id) = match owner_and_item(&kind, &id, &item) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.get(owner, &item_type_id).await {
        Ok(resolved) => Json(resolved).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Manual overwrite of both counters (administrative edit).
pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path((kind, id, item)): Path<(String, String, String)>,
    payload: Result<Json<dto::SetStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let (owner, item_type_id) = match owner_and_item(&kind, &id, &item) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .set_absolute(owner, &item_type_id, body.boxes, body.units)
        .await
    {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn import_legacy(
    Extension(services): Extension<Arc<AppServices>>,
    Path((kind, id)): Path<(String, String)>,
    payload: Result<Json<LegacyStockFields>, JsonRejection>,
) -> axum::response::Response {
    let owner = match dto::owner(&kind, &id) {
        Ok(o) => o,
        Err(e) => return errors::service_error_to_response(e),
    };
    let fields = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.ledger.import_legacy(owner, fields).await {
        Ok(imported) => Json(serde_json::json!({ "imported": imported })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

fn owner_and_item(
    kind: &str,
    id: &str,
    item: &str,
) -> Result<(stockline_inventory::OwnerRef, ItemTypeId), axum::response::Response> {
    let owner = dto::owner(kind, id).map_err(errors::service_error_to_response)?;
    let item_type_id = ItemTypeId::parse(item).map_err(|e| errors::service_error_to_response(e.into()))?;
    Ok((owner, item_type_id))
}

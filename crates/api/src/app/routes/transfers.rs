use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/transfer", post(submit_transfer))
        .route("/transfer/:id", get(get_transfer))
        .route("/transfer/:id/accept", post(accept_transfer))
        .route("/transfer/:id/reject", post(reject_transfer))
        .route("/transfers", get(list_transfers).delete(delete_transfers))
}

pub async fn submit_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    payload: Result<Json<dto::CreateTransferRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let draft = match body.into_draft() {
        Ok(d) => d,
        Err(e) => return errors::service_error_to_response(e),
    };

    match services.transfers.submit(draft, actor.actor_id()).await {
        Ok(row) => (StatusCode::CREATED, Json(row)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse(&id) {
        Ok(v) => v,
        Err(e) => return errors::service_error_to_response(e),
    };

    match services.transfers.get(id).await {
        Ok(row) => Json(row).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn accept_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse(&id) {
        Ok(v) => v,
        Err(e) => return errors::service_error_to_response(e),
    };

    tracing::debug!(actor = %actor.actor_id(), transfer_id = %id, "accept requested");
    match services.transfers.accept(id).await {
        Ok(row) => Json(row).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reject_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    raw: Bytes,
) -> axum::response::Response {
    let id = match dto::parse(&id) {
        Ok(v) => v,
        Err(e) => return errors::service_error_to_response(e),
    };
    // The reason is optional, and so is the body.
    let reason = match dto::optional_body::<dto::RejectTransferRequest>(&raw) {
        Ok(body) => body.and_then(|b| b.reason),
        Err(resp) => return resp,
    };

    tracing::debug!(actor = %actor.actor_id(), transfer_id = %id, "reject requested");
    match services.transfers.reject(id, reason).await {
        Ok(row) => Json(row).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_transfers(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::TransferListQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(e) => return errors::service_error_to_response(e),
    };

    match services.transfers.list(&filter).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_transfers(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::DeleteTransfersRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let ids = match body.transfer_ids() {
        Ok(ids) => ids,
        Err(e) => return errors::service_error_to_response(e),
    };

    match services.transfers.bulk_delete(&ids).await {
        Ok(deleted) => Json(dto::DeletedResponse { deleted }).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

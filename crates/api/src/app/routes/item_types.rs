use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};

use stockline_catalog::{ItemTypeId, ItemTypePatch, NewItemType};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_item_types).post(create_item_type))
        .route("/seed", post(seed_item_types))
        .route("/:id", get(get_item_type).patch(update_item_type))
        .route("/:id/toggle-active", patch(toggle_active))
        .route("/:id/toggle-visibility", patch(toggle_visibility))
}

pub async fn list_item_types(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ItemTypeListQuery>,
) -> axum::response::Response {
    match services.registry.list(query.into()).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_item_type(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<NewItemType>, JsonRejection>,
) -> axum::response::Response {
    let input = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.registry.create(input).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item_type(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match ItemTypeId::parse(&id) {
        Ok(v) => v,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match services.registry.get(&id).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Unknown fields (including `id`) are refused: ids never change.
pub async fn update_item_type(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<ItemTypePatch>, JsonRejection>,
) -> axum::response::Response {
    let id = match ItemTypeId::parse(&id) {
        Ok(v) => v,
        Err(e) => return errors::service_error_to_response(e.into()),
    };
    let patch = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.registry.update(&id, patch).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn toggle_active(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<dto::ToggleActiveRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match ItemTypeId::parse(&id) {
        Ok(v) => v,
        Err(e) => return errors::service_error_to_response(e.into()),
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.registry.toggle_active(&id, body.is_active).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn toggle_visibility(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<dto::ToggleVisibilityRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match ItemTypeId::parse(&id) {
        Ok(v) => v,
        Err(e) => return errors::service_error_to_response(e.into()),
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.registry.toggle_visibility(&id, body.is_visible).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn seed_item_types(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.registry.seed_defaults().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

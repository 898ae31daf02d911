use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/operations", get(list_operations))
}

/// Processed transfers grouped into operations, newest day first.
pub async fn list_operations(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::TransferListQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(e) => return errors::service_error_to_response(e),
    };

    match services.transfers.operations(&filter).await {
        Ok(ops) => Json(ops).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

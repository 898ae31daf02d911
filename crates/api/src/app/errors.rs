use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockline_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let status = match &err {
        ServiceError::Validation(_) | ServiceError::InvalidId(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::AlreadyProcessed(_) | ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Persistence(e) => {
            tracing::error!(error = %e, "persistence failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    // Store details stay in the logs.
    let message = match &err {
        ServiceError::Persistence(_) => "internal storage error".to_string(),
        other => other.to_string(),
    };

    json_error(status, err.code(), message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

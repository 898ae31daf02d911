//! HTTP application wiring (Axum router + services).
//!
//! - `services.rs`: storage backend selection and service construction
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request/response shapes and parsing helpers
//! - `errors.rs`: the common `{"error", "message"}` body

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router over already-built services.
pub fn build_app(services: AppServices) -> Router {
    // Everything except /health requires an actor.
    let protected = routes::router()
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn(middleware::actor_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}

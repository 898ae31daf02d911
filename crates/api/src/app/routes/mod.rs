use axum::Router;

pub mod inventory;
pub mod item_types;
pub mod operations;
pub mod system;
pub mod transfers;

/// Router for every endpoint that requires an actor.
pub fn router() -> Router {
    Router::new()
        .merge(transfers::router())
        .merge(operations::router())
        .nest("/itemTypes", item_types::router())
        .nest("/inventory", inventory::router())
}

//! HTTP API: routing, request context and response mapping over the
//! stockline services.

pub mod app;
pub mod context;
pub mod middleware;

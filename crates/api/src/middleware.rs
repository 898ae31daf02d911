use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockline_core::ActorId;

use crate::app::errors::json_error;
use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Require a well-formed `x-actor-id` header and expose it as [`ActorContext`].
pub async fn actor_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let actor_id = match extract_actor(req.headers()) {
        Ok(id) => id,
        Err(msg) => return json_error(StatusCode::UNAUTHORIZED, "unauthorized", msg),
    };

    req.extensions_mut().insert(ActorContext::new(actor_id));
    next.run(req).await
}

fn extract_actor(headers: &HeaderMap) -> Result<ActorId, &'static str> {
    let raw = headers
        .get(ACTOR_HEADER)
        .ok_or("missing x-actor-id header")?
        .to_str()
        .map_err(|_| "x-actor-id is not valid text")?
        .trim();

    if raw.is_empty() {
        return Err("missing x-actor-id header");
    }

    raw.parse().map_err(|_| "x-actor-id must be a uuid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn actor_header_must_be_present_and_a_uuid() {
        let mut headers = HeaderMap::new();
        assert!(extract_actor(&headers).is_err());

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("  "));
        assert!(extract_actor(&headers).is_err());

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("alice"));
        assert_eq!(extract_actor(&headers), Err("x-actor-id must be a uuid"));

        let id = ActorId::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(extract_actor(&headers), Ok(id));
    }
}

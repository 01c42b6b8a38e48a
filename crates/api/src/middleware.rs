use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockledger_core::Actor;

use crate::app::errors;
use crate::context::ActorContext;

/// Header naming the acting user.
pub const ACTOR_HEADER: &str = "x-actor";

/// Attach an [`ActorContext`] to the request.
///
/// A missing or blank header means an unattended write by `System`; a header
/// that is not a valid actor name is rejected.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let actor = extract_actor(req.headers())?;
    req.extensions_mut().insert(ActorContext::new(actor));
    Ok(next.run(req).await)
}

fn extract_actor(headers: &HeaderMap) -> Result<Actor, Response> {
    let Some(header) = headers.get(ACTOR_HEADER) else {
        return Ok(Actor::system());
    };

    let value = header.to_str().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_actor",
            "actor header must be valid text",
        )
    })?;

    if value.trim().is_empty() {
        return Ok(Actor::system());
    }

    Actor::new(value)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_actor", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_or_blank_header_is_system() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_actor(&headers).unwrap(), Actor::system());
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("  "));
        assert_eq!(extract_actor(&headers).unwrap(), Actor::system());
    }

    #[test]
    fn header_names_the_actor() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_static(" alice "));
        assert_eq!(extract_actor(&headers).unwrap().as_str(), "alice");
    }

    #[test]
    fn overlong_actor_is_rejected() {
        let mut headers = HeaderMap::new();
        let long = "a".repeat(Actor::MAX_LEN + 1);
        headers.insert(ACTOR_HEADER, HeaderValue::from_str(&long).unwrap());
        let res = extract_actor(&headers).unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

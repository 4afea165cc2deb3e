use axum::http::{header, HeaderMap};

use strata_core::types::Actor;
use strata_core::PipelineError;

/// Resolves the actor from the `Authorization` header.
///
/// Fails with an unauthorized error when credentials are missing, use a
/// scheme other than `Bearer`, or carry an empty token.
pub fn require_actor(headers: &HeaderMap) -> Result<Actor, PipelineError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| PipelineError::unauthorized("missing authorization header"))?;
    let value = value
        .to_str()
        .map_err(|_| PipelineError::unauthorized("malformed authorization header"))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| PipelineError::unauthorized("authorization scheme must be Bearer"))?;
    verify_token(token)
}

/// Resolves the actor when valid credentials are present, `None` otherwise.
pub fn optional_actor(headers: &HeaderMap) -> Option<Actor> {
    require_actor(headers).ok()
}

/// Stand-in token verification until an identity provider is wired up.
/// Any non-empty token resolves to the fixture identity.
fn verify_token(token: &str) -> Result<Actor, PipelineError> {
    if token.trim().is_empty() {
        return Err(PipelineError::unauthorized("empty bearer token"));
    }
    Ok(Actor {
        id: 1,
        username: "test_user".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use strata_core::ErrorKind;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(value).expect("header value"),
        );
        headers
    }

    #[test]
    fn bearer_token_resolves_the_fixture_actor() {
        let actor = require_actor(&headers_with("Bearer token")).expect("actor resolves");
        assert_eq!(actor.id, 1);
        assert_eq!(actor.username, "test_user");
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let error = require_actor(&HeaderMap::new()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn non_bearer_scheme_is_unauthorized() {
        let error = require_actor(&headers_with("Basic dXNlcjpwYXNz")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn empty_token_is_unauthorized() {
        let error = require_actor(&headers_with("Bearer ")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn optional_actor_swallows_bad_credentials() {
        assert!(optional_actor(&HeaderMap::new()).is_none());
        assert!(optional_actor(&headers_with("Bearer ")).is_none());
        assert!(optional_actor(&headers_with("Bearer token")).is_some());
    }
}

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::TokenCodec;
use crate::error::ApiError;

/// Authentication gate.
///
/// Reads the access token from the `Authorization` header, verifies it and
/// attaches the resulting [`crate::auth::Principal`] to the request
/// extensions. Any failure ends the request with a 401 and nothing further
/// down the stack runs.
pub async fn authenticate(
    State(codec): State<Arc<TokenCodec>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = {
        let token = extract_token(request.headers()).map_err(|reason| {
            tracing::debug!("Rejecting {} {}: {}", request.method(), request.uri().path(), reason);
            ApiError::unauthenticated()
        })?;

        codec.validate_access_token(token).map_err(|e| {
            tracing::debug!("Rejecting {} {}: {}", request.method(), request.uri().path(), e);
            ApiError::unauthenticated()
        })?
    };

    tracing::trace!(subject = %principal.subject_id, role = %principal.role, "authenticated");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// The header carries the raw token. A `Bearer ` prefix is tolerated for
/// clients that add one.
fn extract_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("missing Authorization header")?
        .to_str()
        .map_err(|_| "Authorization header is not valid ASCII")?
        .trim();

    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return Err("empty Authorization header");
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn raw_and_bearer_tokens_are_extracted() {
        assert_eq!(extract_token(&headers("abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(extract_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_or_blank_header_is_rejected() {
        assert!(extract_token(&HeaderMap::new()).is_err());
        assert!(extract_token(&headers("")).is_err());
        assert!(extract_token(&headers("Bearer ")).is_err());
        assert!(extract_token(&headers("   ")).is_err());
    }
}

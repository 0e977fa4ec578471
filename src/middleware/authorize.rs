use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::Principal;
use crate::error::ApiError;
use crate::policy::PolicyStore;

/// Authorization gate. Must run after [`super::authenticate`].
///
/// The resource checked against policy is the matched route template
/// (`/api/questions/:id`), never the concrete URL, so one rule covers
/// every id. No matching rule means the request is refused.
pub async fn authorize(
    State(policies): State<Arc<dyn PolicyStore>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| {
            tracing::warn!("Authorization gate reached without an authenticated principal");
            ApiError::unauthenticated()
        })?;

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .ok_or_else(|| {
            tracing::error!("No matched route for {}; gate must be a route layer", request.uri().path());
            ApiError::internal_server_error("Internal server error")
        })?;

    // owned so no borrow of the request is held across the await
    let verb = request.method().clone();
    let allowed = policies
        .is_allowed(principal.role.as_str(), &route, verb.as_str())
        .await?;

    if !allowed {
        tracing::info!(
            subject = %principal.subject_id,
            role = %principal.role,
            "Denied {} {}",
            verb,
            route
        );
        return Err(ApiError::forbidden("Forbidden"));
    }

    Ok(next.run(request).await)
}

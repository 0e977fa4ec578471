pub mod auth;
pub mod authorize;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, Router};

use crate::auth::TokenCodec;
use crate::policy::PolicyStore;

pub use auth::authenticate;
pub use authorize::authorize;

/// Put every route of `router` behind authentication then authorization.
///
/// Both gates are route layers so the matched route template is known
/// when the policy is consulted, and unmatched paths still 404.
pub fn protect<S>(router: Router<S>, codec: Arc<TokenCodec>, policies: Arc<dyn PolicyStore>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // layers wrap outward: the last one added runs first
    router
        .route_layer(from_fn_with_state(policies, authorize))
        .route_layer(from_fn_with_state(codec, authenticate))
}

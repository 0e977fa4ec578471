use std::sync::Arc;

use crate::auth::TokenCodec;
use crate::backend::Backend;
use crate::policy::PolicyStore;

/// Shared handles built once at startup and cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<TokenCodec>,
    pub policies: Arc<dyn PolicyStore>,
    pub backend: Arc<dyn Backend>,
}

impl AppState {
    pub fn new(codec: Arc<TokenCodec>, policies: Arc<dyn PolicyStore>, backend: Arc<dyn Backend>) -> Self {
        Self {
            codec,
            policies,
            backend,
        }
    }
}

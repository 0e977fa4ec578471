pub mod protected;
pub mod public;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rules = state.policies.list_policies().await.map_err(|e| {
        tracing::error!("Health check could not read policy store: {}", e);
        ApiError::service_unavailable("Policy store unavailable")
    })?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "policy_rules": rules.len()
        }
    })))
}

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use super::session_error;
use crate::auth::{issue_session, TokenPair};
use crate::backend::{BackendError, LoginRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /all/user/login
///
/// Input: `{"login": "...", "password": "..."}`.
/// Output: `{"accessToken": "...", "refreshToken": "..."}`.
///
/// Unknown login and wrong password produce the same 401.
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("Invalid login body: {}", e);
        ApiError::invalid_json("Invalid request body")
    })?;

    let principal = state.backend.login(&request).await.map_err(|e| match e {
        BackendError::InvalidCredentials | BackendError::NotFound(_) => {
            tracing::info!("Login failed for '{}'", request.login);
            ApiError::unauthorized("Invalid credentials")
        }
        other => ApiError::from(other),
    })?;

    let pair = issue_session(&state.codec, &principal).map_err(session_error)?;

    tracing::info!(subject = %principal.subject_id, role = %principal.role, "Login succeeded");
    Ok(Json(pair))
}

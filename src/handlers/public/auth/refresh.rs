use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use super::session_error;
use crate::auth::{refresh_session, TokenPair};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /all/user/refresh
///
/// Input: `{"refreshToken": "..."}`.
/// Output: `{"accessToken": "<new>", "refreshToken": "<same as input>"}`.
///
/// Any problem with the refresh token is a plain 401; the client has to
/// log in again.
pub async fn refresh_post(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("Invalid refresh body: {}", e);
        ApiError::invalid_json("Invalid request body")
    })?;

    let pair = refresh_session(&state.codec, &request.refresh_token).map_err(session_error)?;
    Ok(Json(pair))
}

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, MatchedPath, Path, Query, State},
    http::Method,
    Extension, Json,
};
use serde_json::Value;

use crate::auth::Principal;
use crate::backend::BackendCall;
use crate::error::ApiError;
use crate::state::AppState;

/// Handler behind every protected route: packages the already
/// authorized request and hands it to the backend.
pub async fn forward(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    matched: MatchedPath,
    method: Method,
    params: Result<Path<HashMap<String, String>>, PathRejection>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let params = path_params(params)?;
    let body = parse_body(&body)?;
    let call = BackendCall {
        principal,
        route: matched.as_str().to_string(),
        method,
        params,
        query,
        body,
    };

    tracing::debug!("Forwarding {} {}", call.method, call.route);
    let response = state.backend.call(call).await?;
    Ok(Json(response))
}

/// Routes without parameters yield an empty map. Any other rejection
/// (e.g. a segment that is not valid UTF-8 once decoded) stops the request.
fn path_params(
    params: Result<Path<HashMap<String, String>>, PathRejection>,
) -> Result<HashMap<String, String>, ApiError> {
    match params {
        Ok(Path(params)) => Ok(params),
        Err(PathRejection::MissingPathParams(_)) => Ok(HashMap::new()),
        Err(e) => {
            tracing::debug!("Invalid path parameters: {}", e);
            Err(ApiError::bad_request("Invalid path parameters"))
        }
    }
}

fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Invalid request body: {}", e);
        ApiError::invalid_json("Invalid request body")
    })
}

//! Seam between the gateway and the platform services (user, group,
//! topic, subject, question, notification, task). The gateway only
//! authenticates, authorizes and forwards; whatever sits behind this
//! trait does the work.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Principal;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// One authorized request, ready to hand to a service.
#[derive(Debug, Clone, Serialize)]
pub struct BackendCall {
    pub principal: Principal,
    /// Route template the request matched, e.g. `/api/questions/:id`.
    pub route: String,
    #[serde(with = "method_str")]
    pub method: Method,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("service error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Verify credentials with the user service.
    async fn login(&self, request: &LoginRequest) -> Result<Principal, BackendError>;

    async fn call(&self, call: BackendCall) -> Result<Value, BackendError>;

    /// Current notifications for the principal, sent over the notification
    /// socket once it has authenticated and again after every mark-as-read.
    async fn notifications(&self, principal: &Principal) -> Result<Value, BackendError>;

    async fn mark_notification_read(
        &self,
        principal: &Principal,
        notification_id: &str,
    ) -> Result<(), BackendError>;
}

/// Backend used when no service clients are wired in. Every call fails
/// with `Unavailable`, so the gateway still authenticates and authorizes
/// but never pretends a service answered.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredBackend;

#[async_trait]
impl Backend for UnconfiguredBackend {
    async fn login(&self, _request: &LoginRequest) -> Result<Principal, BackendError> {
        Err(BackendError::Unavailable("user service is not configured".to_string()))
    }

    async fn call(&self, call: BackendCall) -> Result<Value, BackendError> {
        Err(BackendError::Unavailable(format!(
            "no service configured for {} {}",
            call.method, call.route
        )))
    }

    async fn notifications(&self, _principal: &Principal) -> Result<Value, BackendError> {
        Err(BackendError::Unavailable("notification service is not configured".to_string()))
    }

    async fn mark_notification_read(
        &self,
        _principal: &Principal,
        _notification_id: &str,
    ) -> Result<(), BackendError> {
        Err(BackendError::Unavailable("notification service is not configured".to_string()))
    }
}

mod method_str {
    use axum::http::Method;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }
}

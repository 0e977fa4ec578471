#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use edu_gateway::auth::{ManualClock, Principal, Role, TokenCodec, TokenSettings};
use edu_gateway::backend::{Backend, BackendCall, BackendError, LoginRequest};
use edu_gateway::policy::{default_policies, MemoryPolicyStore, PolicyError, PolicyRule, PolicyStore};
use edu_gateway::routes;
use edu_gateway::state::AppState;

pub const T0: i64 = 1_700_000_000;

/// Backend double that knows one account and records every forwarded call.
/// A forwarded call is echoed back as the response body.
#[derive(Default)]
pub struct SpyBackend {
    calls: Mutex<Vec<BackendCall>>,
}

impl SpyBackend {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for SpyBackend {
    async fn login(&self, request: &LoginRequest) -> Result<Principal, BackendError> {
        match (request.login.as_str(), request.password.as_str()) {
            ("teacher1", "secret") => Ok(Principal::new("u1", Role::Teacher)),
            ("teacher1", _) => Err(BackendError::InvalidCredentials),
            _ => Err(BackendError::NotFound("User not found".to_string())),
        }
    }

    async fn call(&self, call: BackendCall) -> Result<Value, BackendError> {
        let echoed = serde_json::to_value(&call).map_err(|e| BackendError::Internal(e.to_string()))?;
        self.calls.lock().unwrap().push(call);
        Ok(echoed)
    }

    async fn notifications(&self, principal: &Principal) -> Result<Value, BackendError> {
        Ok(serde_json::json!({
            "user_id": principal.subject_id,
            "notifications": [{ "id": "n1", "message": "New task assigned" }]
        }))
    }

    async fn mark_notification_read(&self, _principal: &Principal, _notification_id: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Store whose every operation fails, as if its lock were poisoned.
pub struct FailingPolicyStore;

#[async_trait]
impl PolicyStore for FailingPolicyStore {
    async fn load_policies(&self, _rules: &[PolicyRule]) -> Result<(), PolicyError> {
        Err(PolicyError::Unavailable("policy lock poisoned".to_string()))
    }

    async fn is_allowed(&self, _role: &str, _resource: &str, _verb: &str) -> Result<bool, PolicyError> {
        Err(PolicyError::Unavailable("policy lock poisoned".to_string()))
    }

    async fn list_policies(&self) -> Result<Vec<PolicyRule>, PolicyError> {
        Err(PolicyError::Unavailable("policy lock poisoned".to_string()))
    }
}

pub struct TestGateway {
    pub router: Router,
    pub codec: Arc<TokenCodec>,
    pub clock: Arc<ManualClock>,
    pub backend: Arc<SpyBackend>,
}

impl TestGateway {
    /// Gateway with the built-in rules and a clock fixed at [`T0`].
    pub async fn new() -> Self {
        let policies = MemoryPolicyStore::with_rules(default_policies()).expect("default rules are valid");
        Self::with_policies(Arc::new(policies))
    }

    pub fn with_policies(policies: Arc<dyn PolicyStore>) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let codec = Arc::new(
            TokenCodec::new(TokenSettings {
                access_secret: "test-access-secret".to_string(),
                refresh_secret: "test-refresh-secret".to_string(),
                access_ttl_secs: 30 * 60,
                refresh_ttl_secs: 3 * 24 * 60 * 60,
            })
            .with_clock(clock.clone()),
        );
        let backend = Arc::new(SpyBackend::default());

        let state = AppState::new(codec.clone(), policies, backend.clone());

        Self {
            router: routes::router(state),
            codec,
            clock,
            backend,
        }
    }

    pub fn access_token(&self, subject: &str, role: Role) -> String {
        self.codec.issue_access_token(subject, &role).unwrap()
    }

    pub fn refresh_token(&self, subject: &str, role: Role) -> String {
        self.codec.issue_refresh_token(subject, &role).unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }

    /// Serve the router on an ephemeral local port; returns its address.
    pub async fn listen(&self) -> Result<std::net::SocketAddr> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let router = self.router.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(addr)
    }

    pub async fn send_raw(&self, method: Method, uri: &str, content_type: &str, body: &'static str) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))?;

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok((status, json))
    }
}

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

use super::claims::{Claims, Principal, Role, TokenKind};
use crate::config::SecurityConfig;

/// Source of "now" for issuing and expiry checks, in Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock that only moves when told to. Used by tests and by
/// `gatewayctl token verify --at`.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token expired")]
    Expired,
}

/// Secrets and lifetimes for both token kinds.
#[derive(Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl TokenSettings {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            access_secret: security.access_secret.clone(),
            refresh_secret: security.refresh_secret.clone(),
            access_ttl_secs: security.access_token_ttl_secs,
            refresh_ttl_secs: security.refresh_token_ttl_secs,
        }
    }
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    configured: bool,
    ttl_secs: i64,
}

impl SigningKey {
    fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            configured: !secret.is_empty(),
            ttl_secs,
        }
    }
}

/// Issues and verifies HS256 bearer tokens.
///
/// Access and refresh tokens are signed with separate secrets and also
/// carry their kind in the `typ` claim, so a refresh token is rejected by
/// the access validator even if an operator configured the same secret
/// for both. Expiry is checked against the codec's [`Clock`] with no
/// leeway: a token is valid while `now < exp`.
pub struct TokenCodec {
    access: SigningKey,
    refresh: SigningKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(settings: TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is checked against our own clock in `validate`
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            access: SigningKey::new(&settings.access_secret, settings.access_ttl_secs),
            refresh: SigningKey::new(&settings.refresh_secret, settings.refresh_ttl_secs),
            validation,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(TokenSettings::from_config(security))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fails if either signing secret is missing or either lifetime is not
    /// positive. Called once at startup so a misconfigured gateway never
    /// starts accepting requests.
    pub fn ensure_configured(&self) -> Result<(), TokenError> {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            let key = self.key(kind);
            if !key.configured {
                return Err(TokenError::Signing(format!(
                    "{kind} signing key is not configured"
                )));
            }
            if key.ttl_secs <= 0 {
                return Err(TokenError::Signing(format!(
                    "{kind} token lifetime must be positive, got {}s",
                    key.ttl_secs
                )));
            }
        }
        Ok(())
    }

    pub fn issue_access_token(&self, subject_id: &str, role: &Role) -> Result<String, TokenError> {
        self.issue(TokenKind::Access, subject_id, role)
    }

    pub fn issue_refresh_token(&self, subject_id: &str, role: &Role) -> Result<String, TokenError> {
        self.issue(TokenKind::Refresh, subject_id, role)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Principal, TokenError> {
        self.validate(TokenKind::Access, token).map(Principal::from)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Principal, TokenError> {
        self.validate(TokenKind::Refresh, token).map(Principal::from)
    }

    /// Full claim set of a verified token, for diagnostics.
    pub fn decode_claims(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        self.validate(kind, token)
    }

    fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn issue(&self, kind: TokenKind, subject_id: &str, role: &Role) -> Result<String, TokenError> {
        let key = self.key(kind);
        if !key.configured {
            return Err(TokenError::Signing(format!(
                "{kind} signing key is not configured"
            )));
        }
        if subject_id.trim().is_empty() {
            return Err(TokenError::Signing(
                "refusing to sign a token without a subject id".to_string(),
            ));
        }

        let now = self.clock.now();
        let exp = now.checked_add(key.ttl_secs).ok_or_else(|| {
            TokenError::Signing(format!("{kind} token lifetime {}s overflows", key.ttl_secs))
        })?;
        let claims = Claims {
            user_id: subject_id.to_string(),
            role: role.clone(),
            typ: kind,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn validate(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let key = self.key(kind);
        if !key.configured {
            return Err(TokenError::Invalid(format!(
                "{kind} signing key is not configured"
            )));
        }

        let claims = decode::<Claims>(token, &key.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?
            .claims;

        if claims.typ != kind {
            return Err(TokenError::Invalid(format!(
                "expected {kind} token, got {}",
                claims.typ
            )));
        }
        if claims.user_id.trim().is_empty() {
            return Err(TokenError::Invalid("missing user_id claim".to_string()));
        }
        if self.clock.now() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl_secs", &self.access.ttl_secs)
            .field("refresh_ttl_secs", &self.refresh.ttl_secs)
            .finish_non_exhaustive()
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller role carried in every token.
///
/// The four platform roles are named variants; anything else a user
/// backend hands out is kept verbatim as `Custom` so new roles only need
/// policy rules, not a release. An empty role is never constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Support,
    Custom(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Support => "support",
            Role::Custom(name) => name,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("role must be a non-empty string")]
pub struct EmptyRole;

impl TryFrom<String> for Role {
    type Error = EmptyRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "" => Err(EmptyRole),
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            "support" => Ok(Role::Support),
            _ if value.trim().is_empty() => Err(EmptyRole),
            _ => Ok(Role::Custom(value)),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = EmptyRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::try_from(s.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which key a token was signed with and which validator accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// JWT payload. Every field is required at decode time; there are no
/// serde defaults so a token missing a claim fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub role: Role,
    pub typ: TokenKind,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identity attached to a request after the authentication gate accepts
/// its token. Lives only as long as the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
        }
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.user_id,
            role: claims.role,
        }
    }
}

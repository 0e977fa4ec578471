//! Role / route / verb allow rules and the stores that answer
//! "may this role call this route".
//!
//! Resources are route templates in the router's own syntax
//! (`/api/groups/getById/:group_id`). A `:name` segment in a rule matches
//! any non-empty segment in the same position; every other segment must
//! match literally and both paths must have the same number of segments.
//! Verbs compare exactly and case-sensitively. Rules only ever allow, so a
//! request with no matching rule is denied.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, PolicyBackend};

pub mod defaults;
pub mod memory;
pub mod postgres;

pub use defaults::default_policies;
pub use memory::MemoryPolicyStore;
pub use postgres::PgPolicyStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRule {
    pub role: String,
    pub resource: String,
    pub verb: String,
}

impl PolicyRule {
    pub fn new(role: impl Into<String>, resource: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            resource: resource.into(),
            verb: verb.into(),
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let reason = if self.role.trim().is_empty() {
            Some("role is empty")
        } else if self.verb.trim().is_empty() {
            Some("verb is empty")
        } else if !self.resource.starts_with('/') {
            Some("resource must start with '/'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(PolicyError::InvalidRule {
                rule: self.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    pub fn matches(&self, role: &str, resource: &str, verb: &str) -> bool {
        self.role == role && self.verb == verb && resource_matches(&self.resource, resource)
    }
}

impl std::fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.role, self.verb, self.resource)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid policy rule ({rule}): {reason}")]
    InvalidRule { rule: PolicyRule, reason: &'static str },

    #[error("policy file could not be parsed: {0}")]
    Parse(String),

    #[error("policy store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

/// Decision point consulted by the authorization gate.
///
/// `is_allowed` returns `Ok(false)` for "no rule matched"; errors are
/// reserved for the store itself being unusable.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Insert rules. Re-inserting a rule that is already present is a no-op.
    async fn load_policies(&self, rules: &[PolicyRule]) -> Result<(), PolicyError>;

    async fn is_allowed(&self, role: &str, resource: &str, verb: &str) -> Result<bool, PolicyError>;

    async fn list_policies(&self) -> Result<Vec<PolicyRule>, PolicyError>;
}

/// Build the store selected by `POLICY_BACKEND`. Rules are not loaded here.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn PolicyStore>, PolicyError> {
    match config.policy.backend {
        PolicyBackend::Memory => Ok(Arc::new(MemoryPolicyStore::new())),
        PolicyBackend::Postgres => {
            let url = config
                .policy
                .database_url
                .as_deref()
                .ok_or_else(|| PolicyError::Unavailable("DATABASE_URL is not set".to_string()))?;
            Ok(Arc::new(PgPolicyStore::connect(url, &config.database).await?))
        }
    }
}

pub fn resource_matches(pattern: &str, resource: &str) -> bool {
    let mut pattern_segments = pattern.split('/');
    let mut resource_segments = resource.split('/');

    loop {
        match (pattern_segments.next(), resource_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(r)) if segment_matches(p, r) => continue,
            _ => return false,
        }
    }
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    match pattern.strip_prefix(':') {
        Some(name) if !name.is_empty() => !segment.is_empty(),
        _ => pattern == segment,
    }
}

/// Routes that no rule grants to any role. They are still routed, but
/// every call to them is denied.
pub fn unreachable_routes<'a>(
    routes: impl IntoIterator<Item = (&'a str, &'a str)>,
    rules: &[PolicyRule],
) -> Vec<(&'a str, &'a str)> {
    routes
        .into_iter()
        .filter(|(verb, path)| {
            !rules
                .iter()
                .any(|rule| rule.verb == *verb && resource_matches(&rule.resource, path))
        })
        .collect()
}

/// Parse a YAML sequence of `{role, resource, verb}` mappings.
pub fn parse_rules_yaml(text: &str) -> Result<Vec<PolicyRule>, PolicyError> {
    let rules: Vec<PolicyRule> =
        serde_yaml::from_str(text).map_err(|e| PolicyError::Parse(e.to_string()))?;
    for rule in &rules {
        rule.validate()?;
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_segments_match_exactly() {
        assert!(resource_matches("/api/user/getprofile", "/api/user/getprofile"));
        assert!(!resource_matches("/api/user/getprofile", "/api/user/getProfile"));
        assert!(!resource_matches("/api/user/getprofile", "/api/user/all"));
    }

    #[test]
    fn parameter_segment_matches_any_value() {
        let rule = "/api/groups/getById/:group_id";
        assert!(resource_matches(rule, "/api/groups/getById/:group_id"));
        assert!(resource_matches(rule, "/api/groups/getById/:id"));
        assert!(resource_matches(rule, "/api/groups/getById/42"));
        assert!(!resource_matches(rule, "/api/groups/getById/"));
    }

    #[test]
    fn segment_count_must_agree() {
        let rule = "/api/questions/:id";
        assert!(!resource_matches(rule, "/api/questions"));
        assert!(!resource_matches(rule, "/api/questions/7/extra"));
        assert!(!resource_matches(rule, "/api/questions/update/7"));
        assert!(!resource_matches("/api/user/all", "/api/user/all/"));
    }

    #[test]
    fn literal_rule_does_not_match_parameter_route() {
        // a concrete-looking rule must not grant a whole templated route
        assert!(!resource_matches("/api/subjects/get/1", "/api/subjects/get/:id"));
    }

    #[test]
    fn bare_colon_is_a_literal() {
        assert!(resource_matches("/api/:", "/api/:"));
        assert!(!resource_matches("/api/:", "/api/x"));
    }

    #[test]
    fn rule_validation_rejects_incomplete_rules() {
        assert!(PolicyRule::new("admin", "/api/user/all", "GET").validate().is_ok());
        assert!(PolicyRule::new("", "/api/user/all", "GET").validate().is_err());
        assert!(PolicyRule::new("admin", "api/task/get", "GET").validate().is_err());
        assert!(PolicyRule::new("admin", "/api/task/get", "").validate().is_err());
    }

    #[test]
    fn unreachable_routes_lists_routes_without_rules() {
        let rules = vec![
            PolicyRule::new("admin", "/api/user/all", "GET"),
            PolicyRule::new("teacher", "/api/questions/:id", "GET"),
        ];
        let routes = [
            ("GET", "/api/user/all"),
            ("DELETE", "/api/user/all"),
            ("GET", "/api/questions/:id"),
            ("DELETE", "/api/user/delete/:id"),
        ];

        let missing = unreachable_routes(routes, &rules);
        assert_eq!(missing, vec![("DELETE", "/api/user/all"), ("DELETE", "/api/user/delete/:id")]);
    }

    #[test]
    fn yaml_rules_parse_and_validate() {
        let yaml = r#"
- role: support
  resource: /api/groups/getAll
  verb: GET
- role: student
  resource: /api/task/get
  verb: GET
"#;
        let rules = parse_rules_yaml(yaml).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0], PolicyRule::new("support", "/api/groups/getAll", "GET"));

        let bad = "- role: student\n  resource: api/task/get\n  verb: GET\n";
        assert!(matches!(parse_rules_yaml(bad), Err(PolicyError::InvalidRule { .. })));
        assert!(matches!(parse_rules_yaml("- role: [1"), Err(PolicyError::Parse(_))));
    }
}

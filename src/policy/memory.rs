use std::collections::BTreeSet;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{PolicyError, PolicyRule, PolicyStore};

/// Policy rules held in process memory.
///
/// Used directly when `POLICY_BACKEND=memory`, and as the request-time
/// snapshot behind [`super::PgPolicyStore`]. Writes happen at startup or
/// during an administrative reload; requests only take the read lock.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    rules: RwLock<BTreeSet<PolicyRule>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: impl IntoIterator<Item = PolicyRule>) -> Result<Self, PolicyError> {
        let rules = rules
            .into_iter()
            .map(|rule| rule.validate().map(|_| rule))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self {
            rules: RwLock::new(rules),
        })
    }

    /// Swap the whole rule set, e.g. after re-reading the durable store.
    pub(crate) fn replace(&self, rules: BTreeSet<PolicyRule>) -> Result<(), PolicyError> {
        let mut guard = self
            .rules
            .write()
            .map_err(|_| PolicyError::Unavailable("policy lock poisoned".to_string()))?;
        *guard = rules;
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeSet<PolicyRule>>, PolicyError> {
        self.rules
            .read()
            .map_err(|_| PolicyError::Unavailable("policy lock poisoned".to_string()))
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn load_policies(&self, rules: &[PolicyRule]) -> Result<(), PolicyError> {
        for rule in rules {
            rule.validate()?;
        }

        let mut guard = self
            .rules
            .write()
            .map_err(|_| PolicyError::Unavailable("policy lock poisoned".to_string()))?;
        let before = guard.len();
        guard.extend(rules.iter().cloned());

        tracing::debug!(
            "Loaded {} policy rules ({} new, {} total)",
            rules.len(),
            guard.len() - before,
            guard.len()
        );
        Ok(())
    }

    async fn is_allowed(&self, role: &str, resource: &str, verb: &str) -> Result<bool, PolicyError> {
        Ok(self
            .read()?
            .iter()
            .any(|rule| rule.matches(role, resource, verb)))
    }

    async fn list_policies(&self) -> Result<Vec<PolicyRule>, PolicyError> {
        Ok(self.read()?.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::default_policies;

    #[tokio::test]
    async fn student_profile_rule_allows_get_only() {
        let store = MemoryPolicyStore::new();
        store
            .load_policies(&[PolicyRule::new("student", "/api/user/getprofile", "GET")])
            .await
            .unwrap();

        assert!(store.is_allowed("student", "/api/user/getprofile", "GET").await.unwrap());
        assert!(!store.is_allowed("student", "/api/user/getprofile", "DELETE").await.unwrap());
        assert!(!store.is_allowed("student", "/api/user/getprofile", "get").await.unwrap());
        assert!(!store.is_allowed("teacher", "/api/user/getprofile", "GET").await.unwrap());
    }

    #[tokio::test]
    async fn loading_twice_changes_nothing() {
        let store = MemoryPolicyStore::new();
        let rules = default_policies();

        store.load_policies(&rules).await.unwrap();
        let first = store.list_policies().await.unwrap();
        store.load_policies(&rules).await.unwrap();
        let second = store.list_policies().await.unwrap();

        assert_eq!(first, second);
        assert!(store.is_allowed("admin", "/api/groups/create", "POST").await.unwrap());
        assert!(!store.is_allowed("support", "/api/groups/create", "POST").await.unwrap());
    }

    #[tokio::test]
    async fn parameter_rules_match_route_templates() {
        let store = MemoryPolicyStore::with_rules(default_policies()).unwrap();

        assert!(store
            .is_allowed("student", "/api/groups/student-groups/:hh_id", "GET")
            .await
            .unwrap());
        assert!(store
            .is_allowed("teacher", "/api/questions/:id", "GET")
            .await
            .unwrap());
        assert!(!store
            .is_allowed("student", "/api/questions/:id", "GET")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_role_is_denied() {
        let store = MemoryPolicyStore::with_rules(default_policies()).unwrap();
        assert!(!store.is_allowed("librarian", "/api/topics/getAll", "GET").await.unwrap());
        assert!(!store.is_allowed("", "/api/topics/getAll", "GET").await.unwrap());
    }

    #[tokio::test]
    async fn invalid_rule_aborts_the_whole_load() {
        let store = MemoryPolicyStore::new();
        let rules = [
            PolicyRule::new("admin", "/api/user/all", "GET"),
            PolicyRule::new("admin", "api/task/get", "GET"),
        ];

        assert!(store.load_policies(&rules).await.is_err());
        assert!(store.list_policies().await.unwrap().is_empty());
    }
}

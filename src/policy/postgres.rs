use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use super::{MemoryPolicyStore, PolicyError, PolicyRule, PolicyStore};
use crate::config::DatabaseConfig;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS policy_rules (
        role     TEXT NOT NULL,
        resource TEXT NOT NULL,
        verb     TEXT NOT NULL,
        PRIMARY KEY (role, resource, verb)
    )
"#;

/// Durable policy store.
///
/// Rules live in the `policy_rules` table so an administrative load
/// survives restarts. Decisions are answered from an in-memory snapshot
/// that is re-read after every load, so the request path never waits on
/// the database.
pub struct PgPolicyStore {
    pool: PgPool,
    snapshot: MemoryPolicyStore,
}

impl PgPolicyStore {
    pub async fn connect(database_url: &str, config: &DatabaseConfig) -> Result<Self, PolicyError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(database_url)
            .await?;

        info!("Connected policy store to {}", describe_target(database_url));
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: PgPool) -> Result<Self, PolicyError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;

        let store = Self {
            pool,
            snapshot: MemoryPolicyStore::new(),
        };
        store.reload().await?;
        Ok(store)
    }

    /// Re-read every rule from the table into the request-time snapshot.
    pub async fn reload(&self) -> Result<usize, PolicyError> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT role, resource, verb FROM policy_rules ORDER BY role, resource, verb",
        )
        .fetch_all(&self.pool)
        .await?;

        let rules: BTreeSet<PolicyRule> = rows
            .into_iter()
            .map(|(role, resource, verb)| PolicyRule { role, resource, verb })
            .collect();
        let count = rules.len();
        self.snapshot.replace(rules)?;

        info!("Policy snapshot holds {} rules", count);
        Ok(count)
    }
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn load_policies(&self, rules: &[PolicyRule]) -> Result<(), PolicyError> {
        for rule in rules {
            rule.validate()?;
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for rule in rules {
            let result = sqlx::query(
                "INSERT INTO policy_rules (role, resource, verb) VALUES ($1, $2, $3) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(&rule.role)
            .bind(&rule.resource)
            .bind(&rule.verb)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        info!("Stored {} policy rules ({} new)", rules.len(), inserted);
        self.reload().await?;
        Ok(())
    }

    async fn is_allowed(&self, role: &str, resource: &str, verb: &str) -> Result<bool, PolicyError> {
        self.snapshot.is_allowed(role, resource, verb).await
    }

    async fn list_policies(&self) -> Result<Vec<PolicyRule>, PolicyError> {
        self.snapshot.list_policies().await
    }
}

/// `host:port/database` without credentials, for logs.
fn describe_target(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(url) => format!(
            "{}:{}{}",
            url.host_str().unwrap_or("localhost"),
            url.port().unwrap_or(5432),
            url.path()
        ),
        Err(_) => "<unparseable DATABASE_URL>".to_string(),
    }
}

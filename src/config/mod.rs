use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub policy: PolicyConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub access_secret: String,
    #[serde(skip_serializing)]
    pub refresh_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub backend: PolicyBackend,
    /// Load the built-in rule list at startup.
    pub load_defaults: bool,
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("ACCESS_KEY and REFRESH_KEY must differ")]
    SharedSigningKey,

    #[error("{0} must be a positive number of seconds")]
    NonPositiveTtl(&'static str),

    #[error("access token lifetime must be shorter than refresh token lifetime")]
    AccessTtlNotShorter,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Checks that have to pass before the gateway accepts traffic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.access_secret.is_empty() {
            return Err(ConfigError::Missing("ACCESS_KEY"));
        }
        if self.security.refresh_secret.is_empty() {
            return Err(ConfigError::Missing("REFRESH_KEY"));
        }
        if self.security.access_secret == self.security.refresh_secret {
            return Err(ConfigError::SharedSigningKey);
        }
        if self.security.access_token_ttl_secs <= 0 {
            return Err(ConfigError::NonPositiveTtl("SECURITY_ACCESS_TOKEN_TTL_SECS"));
        }
        if self.security.refresh_token_ttl_secs <= 0 {
            return Err(ConfigError::NonPositiveTtl("SECURITY_REFRESH_TOKEN_TTL_SECS"));
        }
        if self.security.access_token_ttl_secs >= self.security.refresh_token_ttl_secs {
            return Err(ConfigError::AccessTtlNotShorter);
        }
        if self.policy.backend == PolicyBackend::Postgres && self.policy.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("GATEWAY_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse().ok())
        {
            self.server.port = port;
        }

        // Security overrides
        // ACCES_KEY is the spelling older deployments' .env files use
        if let Some(v) = first_env(&["ACCESS_KEY", "ACCES_KEY"]) {
            self.security.access_secret = v;
        }
        if let Ok(v) = env::var("REFRESH_KEY") {
            self.security.refresh_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_ACCESS_TOKEN_TTL_SECS") {
            self.security.access_token_ttl_secs = v.parse().unwrap_or(self.security.access_token_ttl_secs);
        }
        if let Ok(v) = env::var("SECURITY_REFRESH_TOKEN_TTL_SECS") {
            self.security.refresh_token_ttl_secs = v.parse().unwrap_or(self.security.refresh_token_ttl_secs);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Policy overrides
        match env::var("POLICY_BACKEND").as_deref() {
            Ok("postgres") => self.policy.backend = PolicyBackend::Postgres,
            Ok("memory") => self.policy.backend = PolicyBackend::Memory,
            _ => {}
        }
        if let Ok(v) = env::var("POLICY_LOAD_DEFAULTS") {
            self.policy.load_defaults = v.parse().unwrap_or(self.policy.load_defaults);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.policy.database_url = Some(v);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            security: SecurityConfig {
                access_secret: "dev-access-secret".to_string(),
                refresh_secret: "dev-refresh-secret".to_string(),
                access_token_ttl_secs: 30 * 60,
                refresh_token_ttl_secs: 7 * 24 * 60 * 60,
                enable_cors: true,
                cors_origins: vec![],
            },
            policy: PolicyConfig {
                backend: PolicyBackend::Memory,
                load_defaults: true,
                database_url: None,
            },
            database: DatabaseConfig {
                max_connections: 5,
                connection_timeout: 30,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            security: SecurityConfig {
                access_secret: String::new(),
                refresh_secret: String::new(),
                access_token_ttl_secs: 30 * 60,
                refresh_token_ttl_secs: 7 * 24 * 60 * 60,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            policy: PolicyConfig {
                backend: PolicyBackend::Postgres,
                load_defaults: true,
                database_url: None,
            },
            database: DatabaseConfig {
                max_connections: 5,
                connection_timeout: 10,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            security: SecurityConfig {
                access_secret: String::new(),
                refresh_secret: String::new(),
                access_token_ttl_secs: 30 * 60,
                refresh_token_ttl_secs: 3 * 24 * 60 * 60,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            policy: PolicyConfig {
                backend: PolicyBackend::Postgres,
                load_defaults: true,
                database_url: None,
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 5,
            },
        }
    }
}

/// Value of the first variable in `names` that is set.
fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env::var(name).ok())
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("enable_cors", &self.enable_cors)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

// Global singleton config - initialized once at startup, read-only after
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_config_is_usable_out_of_the_box() {
        let config = AppConfig::development();
        assert!(config.validate().is_ok());
        assert_eq!(config.security.access_token_ttl_secs, 1800);
        assert_eq!(config.policy.backend, PolicyBackend::Memory);
    }

    #[test]
    fn production_config_requires_secrets() {
        let mut config = AppConfig::production();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("ACCESS_KEY"))));

        config.security.access_secret = "a".repeat(32);
        config.security.refresh_secret = "a".repeat(32);
        assert!(matches!(config.validate(), Err(ConfigError::SharedSigningKey)));

        config.security.refresh_secret = "b".repeat(32);
        assert!(matches!(config.validate(), Err(ConfigError::Missing("DATABASE_URL"))));

        config.policy.database_url = Some("postgres://localhost/casbin".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn token_lifetimes_must_be_positive_and_ordered() {
        let mut config = AppConfig::development();
        config.security.access_token_ttl_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveTtl("SECURITY_ACCESS_TOKEN_TTL_SECS"))
        ));

        config.security.access_token_ttl_secs = 1800;
        config.security.refresh_token_ttl_secs = -10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveTtl("SECURITY_REFRESH_TOKEN_TTL_SECS"))
        ));

        config.security.refresh_token_ttl_secs = 1800;
        assert!(matches!(config.validate(), Err(ConfigError::AccessTtlNotShorter)));

        config.security.refresh_token_ttl_secs = 1801;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_refresh_window_is_shorter() {
        let prod = AppConfig::production();
        let dev = AppConfig::development();
        assert!(prod.security.refresh_token_ttl_secs < dev.security.refresh_token_ttl_secs);
    }

    #[test]
    fn first_set_variable_wins() {
        env::set_var("EDU_GATEWAY_TEST_ALIAS_LEGACY", "legacy");
        assert_eq!(
            first_env(&["EDU_GATEWAY_TEST_ALIAS_PRIMARY", "EDU_GATEWAY_TEST_ALIAS_LEGACY"]).as_deref(),
            Some("legacy")
        );

        env::set_var("EDU_GATEWAY_TEST_ALIAS_PRIMARY", "primary");
        assert_eq!(
            first_env(&["EDU_GATEWAY_TEST_ALIAS_PRIMARY", "EDU_GATEWAY_TEST_ALIAS_LEGACY"]).as_deref(),
            Some("primary")
        );

        assert_eq!(first_env(&["EDU_GATEWAY_TEST_ALIAS_UNSET"]), None);
    }

    #[test]
    fn secrets_never_serialize_or_debug_print() {
        let config = AppConfig::development();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("dev-access-secret"));
        assert!(!format!("{config:?}").contains("dev-refresh-secret"));
    }
}

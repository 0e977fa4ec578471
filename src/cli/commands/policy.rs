use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::config::{AppConfig, PolicyBackend};
use crate::policy::{self, default_policies, parse_rules_yaml, PgPolicyStore, PolicyRule, PolicyStore};

#[derive(Subcommand)]
pub enum PolicyCommands {
    #[command(about = "Load rules into the PostgreSQL policy store (idempotent)")]
    Load {
        #[arg(long, help = "YAML file with a list of {role, resource, verb} rules")]
        file: Option<PathBuf>,
        #[arg(long, help = "Do not include the built-in rule list")]
        no_defaults: bool,
    },

    #[command(about = "List loaded rules")]
    List {
        #[arg(long, help = "Only rules for this role")]
        role: Option<String>,
    },

    #[command(about = "Ask whether a role may call a route")]
    Check {
        #[arg(help = "Role, e.g. student")]
        role: String,
        #[arg(help = "Route template, e.g. /api/questions/:id")]
        resource: String,
        #[arg(help = "HTTP verb, e.g. GET")]
        verb: String,
    },
}

pub async fn handle(cmd: PolicyCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Load { file, no_defaults } => {
            let mut rules = if no_defaults { Vec::new() } else { default_policies() };
            if let Some(path) = file {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                rules.extend(parse_rules_yaml(&text)?);
            }
            anyhow::ensure!(!rules.is_empty(), "nothing to load");

            let url = config
                .policy
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set to load policy")?;
            let store = PgPolicyStore::connect(url, &config.database).await?;
            store.load_policies(&rules).await?;
            let total = store.list_policies().await?.len();

            output_format.emit(&json!({ "submitted": rules.len(), "total": total }), || {
                format!("Submitted {} rules; store now holds {}", rules.len(), total)
            })
        }
        PolicyCommands::List { role } => {
            let store = open(config).await?;
            let rules: Vec<PolicyRule> = store
                .list_policies()
                .await?
                .into_iter()
                .filter(|rule| role.as_deref().map_or(true, |r| rule.role == r))
                .collect();

            output_format.emit(&rules, || {
                rules
                    .iter()
                    .map(|rule| format!("{:<8} {:<7} {}", rule.role, rule.verb, rule.resource))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        PolicyCommands::Check { role, resource, verb } => {
            let store = open(config).await?;
            let allowed = store.is_allowed(&role, &resource, &verb).await?;

            output_format.emit(
                &json!({ "role": role, "resource": resource, "verb": verb, "allowed": allowed }),
                || format!("{} {} {}: {}", role, verb, resource, if allowed { "allow" } else { "deny" }),
            )
        }
    }
}

/// The configured store; the in-memory one starts empty so it gets the
/// built-in rules, matching what the server does at startup.
async fn open(config: &AppConfig) -> anyhow::Result<Arc<dyn PolicyStore>> {
    let store = policy::open_store(config).await?;
    if config.policy.backend == PolicyBackend::Memory {
        store.load_policies(&default_policies()).await?;
    }
    Ok(store)
}

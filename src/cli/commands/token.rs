use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::auth::{ManualClock, Role, TokenCodec, TokenKind};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a token with the configured keys")]
    Issue {
        #[arg(help = "Subject (user) id")]
        subject: String,
        #[arg(help = "Role, e.g. teacher")]
        role: String,
        #[arg(long, help = "Issue a refresh token instead of an access token")]
        refresh: bool,
    },

    #[command(about = "Verify a token and print its claims")]
    Verify {
        #[arg(help = "Token string")]
        token: String,
        #[arg(long, help = "Verify as a refresh token")]
        refresh: bool,
        #[arg(long, help = "Check expiry as of this Unix timestamp instead of now")]
        at: Option<i64>,
    },
}

pub fn handle(cmd: TokenCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let codec = TokenCodec::from_config(&config.security);

    match cmd {
        TokenCommands::Issue { subject, role, refresh } => {
            let role: Role = role.parse().context("role must not be empty")?;
            let token = if refresh {
                codec.issue_refresh_token(&subject, &role)?
            } else {
                codec.issue_access_token(&subject, &role)?
            };

            output_format.emit(&json!({ "token": token }), || token.clone())
        }
        TokenCommands::Verify { token, refresh, at } => {
            let codec = match at {
                Some(at) => codec.with_clock(Arc::new(ManualClock::new(at))),
                None => codec,
            };
            let kind = if refresh { TokenKind::Refresh } else { TokenKind::Access };
            let claims = codec.decode_claims(kind, &token)?;

            output_format.emit(&claims, || {
                format!(
                    "valid {} token\n  subject: {}\n  role:    {}\n  issued:  {}\n  expires: {}",
                    claims.typ, claims.user_id, claims.role, claims.iat, claims.exp
                )
            })
        }
    }
}

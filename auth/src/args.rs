use clap::{Parser, Subcommand};
use eosin_common::args::{JwtArgs, OidcProviderArgs, PostgresArgs, RateLimiterArgs, RedisArgs};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Server(ServerArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct ServerArgs {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[command(flatten)]
    pub redis: RedisArgs,

    #[command(flatten)]
    pub jwt: JwtArgs,

    #[command(flatten)]
    pub rate_limiter: RateLimiterArgs,

    /// JSON array of OIDC provider configs, one object per provider:
    /// `[{"name":"google","issuer":"https://accounts.google.com",...}]`.
    /// A JSON blob rather than repeated flags since clap's derive can't
    /// express "N repetitions of a flag group" cleanly.
    #[arg(long, env = "OIDC_PROVIDERS_JSON", required = true)]
    pub oidc_providers_json: String,
}

impl ServerArgs {
    pub fn oidc_providers(&self) -> anyhow::Result<Vec<OidcProviderArgs>> {
        serde_json::from_str(&self.oidc_providers_json)
            .map_err(|e| anyhow::anyhow!("invalid OIDC_PROVIDERS_JSON: {e}"))
    }
}

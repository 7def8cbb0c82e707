use anyhow::{Context, Result};
use clap::Parser;
use eosin_common::rate_limit::{RateLimiter, RateLimiterConfig};
use eosin_common::shutdown::shutdown_signal;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::app::{App, JwtConfig};
use crate::keys::{Keyset, SigningKey};
use crate::oidc::OidcRegistry;

mod app;
mod args;
mod audit;
mod db;
mod error;
mod keys;
mod oidc;
mod pkce;
mod server;
mod tokens;

/// Refresh tokens are not bounded by an access-token-style CLI flag; spec
/// §3 only says sessions carry an `expires-at`. 30 days matches the
/// "long-lived, revocable, rotated" session model spec §4.E describes.
const REFRESH_TOKEN_TTL_SECS: i64 = 60 * 60 * 24 * 30;

#[tokio::main]
pub async fn main() -> Result<()> {
    eosin_common::init();
    let cli = args::Cli::parse();
    match cli.command {
        args::Commands::Server(args) => run_server(args).await,
    }
}

async fn run_server(args: args::ServerArgs) -> Result<()> {
    eosin_common::metrics::maybe_spawn_metrics_server();

    let pem = tokio::fs::read_to_string(&args.jwt.signing_key_path)
        .await
        .with_context(|| format!("reading JWT signing key at {}", args.jwt.signing_key_path))?;
    let signing_key = SigningKey::from_pem("current", &pem).context("parsing JWT signing key")?;
    let keyset = Keyset::new(signing_key);

    let db = eosin_common::postgres::create_pool(args.postgres.clone()).await;
    db::init_schema(&db).await.context("initializing auth schema")?;

    let redis_pool = eosin_common::init_redis(&args.redis).await;
    let rate_limiter = RateLimiter::new(redis_pool, RateLimiterConfig::from(args.rate_limiter.clone()));

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("building OIDC HTTP client")?;
    let oidc = OidcRegistry::new(
        args.oidc_providers().context("parsing OIDC_PROVIDERS_JSON")?,
        http_client,
    );

    let jwt = JwtConfig {
        issuer: args.jwt.issuer.clone(),
        access_token_ttl_secs: args.jwt.access_token_ttl_secs,
        refresh_token_ttl_secs: REFRESH_TOKEN_TTL_SECS,
    };

    let app_state = App::new(db, rate_limiter, keyset, oidc, jwt);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_clone.cancel();
    });

    server::run_server(cancel, args.port, app_state).await?;
    println!("{}", "🛑 Auth server shut down gracefully.".red());
    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use eosin_common::rate_limit::{RateLimiter, RateLimiterConfig};
use eosin_common::shutdown::shutdown_signal;
use eosin_host_adapter::ClusterAdapter;
use eosin_host_adapter::fake::FakeClusterAdapter;
use eosin_host_adapter::helm::HelmAdapter;
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::app::App;

mod app;
mod args;
mod billing_reconciler;
mod chat_proxy;
mod crypto;
mod db;
mod error;
mod models;
mod server;
mod task_runner;
mod workspace_service;

#[tokio::main]
pub async fn main() -> Result<()> {
    eosin_common::init();
    let cli = args::Cli::parse();
    match cli.command {
        args::Commands::Server(args) => run_server(args).await,
        args::Commands::ReplayTask(args) => replay_task(args).await,
    }
}

async fn run_server(args: args::ServerArgs) -> Result<()> {
    eosin_common::metrics::maybe_spawn_metrics_server();

    let kubeconfig_key = args.kubeconfig_encryption_key()?;

    let pool = eosin_common::postgres::create_pool(args.postgres.clone()).await;
    db::init_schema(&pool).await.context("initializing core schema")?;

    let redis_pool = eosin_common::redis::init_redis(&args.redis).await;
    let rate_limiter = RateLimiter::new(redis_pool, RateLimiterConfig::from(args.rate_limiter.clone()));

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;

    let adapter: Arc<dyn ClusterAdapter> = if args.use_fake_adapter {
        Arc::new(FakeClusterAdapter::new())
    } else {
        Arc::new(
            HelmAdapter::new(args.host_cluster.external_server.clone())
                .await
                .context("connecting to host cluster")?,
        )
    };

    let app_state = App::new(
        pool.clone(),
        rate_limiter,
        adapter.clone(),
        args.auth_issuer.clone(),
        http_client,
        kubeconfig_key,
        args.processor.webhook_secret.clone(),
        args.chat_upstream_base.clone(),
    );

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_clone.cancel();
    });

    let mut runner_config = task_runner::TaskRunnerConfig::new(kubeconfig_key);
    runner_config.worker_count = args.task_runner_workers;

    let runner_cancel = cancel.clone();
    let runner_handle = tokio::spawn(task_runner::run(runner_cancel, pool, adapter, runner_config));

    server::run_server(cancel, args.port, app_state).await?;
    runner_handle.await.context("task runner panicked")?;
    println!("{}", "🛑 Core server shut down gracefully.".red());
    Ok(())
}

/// Forces a single task out of its backoff schedule by resetting
/// `not_before` to now. The worker pool picks it up on its next poll;
/// this command does not run the task itself.
async fn replay_task(args: args::ReplayTaskArgs) -> Result<()> {
    let pool = eosin_common::postgres::create_pool(args.postgres).await;
    let client = pool.get().await.context("getting db connection")?;
    let updated = client
        .execute(
            "UPDATE tasks SET status = 'PENDING', not_before = now() WHERE id = $1",
            &[&args.task_id],
        )
        .await
        .context("resetting task")?;
    if updated == 0 {
        anyhow::bail!("no task found with id {}", args.task_id);
    }
    println!("task {} reset to PENDING", args.task_id);
    Ok(())
}

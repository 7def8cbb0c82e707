use clap::{Parser, Subcommand};
use eosin_common::args::{HostClusterArgs, PostgresArgs, ProcessorArgs, RateLimiterArgs, RedisArgs};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run the HTTP API and the Task Runner worker pool together.
    Server(ServerArgs),
    /// Replay a single PENDING/FAILED task immediately, bypassing backoff.
    /// Useful for operators unstuck-ing a task by hand.
    ReplayTask(ReplayTaskArgs),
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
    pub rate_limiter: RateLimiterArgs,

    #[command(flatten)]
    pub processor: ProcessorArgs,

    #[command(flatten)]
    pub host_cluster: HostClusterArgs,

    /// Base URL of Auth Core, used both to verify bearer tokens against
    /// its published JWKS and as the `iss` claim to validate against.
    #[arg(long, env = "AUTH_ISSUER", required = true)]
    pub auth_issuer: String,

    /// Base URL of the per-workspace inference service the Chat Proxy
    /// forwards turns to.
    #[arg(long, env = "CHAT_UPSTREAM_BASE", required = true)]
    pub chat_upstream_base: String,

    /// 32-byte AES-256 key, hex-encoded, used to encrypt kubeconfigs at
    /// rest.
    #[arg(long, env = "KUBECONFIG_ENCRYPTION_KEY", required = true)]
    pub kubeconfig_encryption_key_hex: String,

    #[arg(long, env = "TASK_RUNNER_WORKERS", default_value_t = 4)]
    pub task_runner_workers: usize,

    /// Use an in-memory cluster adapter instead of shelling out to `helm`.
    /// Only meant for local smoke-testing without a real host cluster.
    #[arg(long, env = "USE_FAKE_ADAPTER", default_value_t = false)]
    pub use_fake_adapter: bool,
}

impl ServerArgs {
    pub fn kubeconfig_encryption_key(&self) -> anyhow::Result<[u8; 32]> {
        let bytes = hex::decode(&self.kubeconfig_encryption_key_hex)
            .map_err(|e| anyhow::anyhow!("KUBECONFIG_ENCRYPTION_KEY must be hex: {e}"))?;
        bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("KUBECONFIG_ENCRYPTION_KEY must decode to exactly 32 bytes"))
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ReplayTaskArgs {
    #[arg(long)]
    pub task_id: String,

    #[command(flatten)]
    pub postgres: PostgresArgs,
}

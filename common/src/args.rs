use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct RateLimiterArgs {
    /// Max requests allowed in the burst window
    #[arg(long, env = "RATE_LIMITER_BURST_LIMIT", default_value_t = 50)]
    pub burst_limit: i64,

    /// Burst window length in milliseconds (e.g. 5000 = 5s)
    #[arg(long, env = "RATE_LIMITER_BURST_WINDOW_MS", default_value_t = 5000)]
    pub burst_window_ms: i64,

    /// Max requests allowed in the long-term window
    #[arg(long, env = "RATE_LIMITER_LONG_LIMIT", default_value_t = 250)]
    pub long_limit: i64,

    /// Long-term window length in milliseconds (e.g. 60000 = 60s)
    #[arg(long, env = "RATE_LIMITER_LONG_WINDOW_MS", default_value_t = 60000)]
    pub long_window_ms: i64,

    /// Max list length to keep per key (upper bound on work per check)
    #[arg(long, env = "RATE_LIMITER_MAX_LIST_SIZE", default_value_t = 1000)]
    pub max_list_size: i64,

    /// Optional key prefix
    #[arg(long, env = "RATE_LIMITER_KEY_PREFIX", default_value = "")]
    pub key_prefix: String,
}

#[derive(Parser, Debug, Clone)]
pub struct DatabaseArgs {
    #[arg(long, default_value = "postgres")]
    pub db: String,

    #[clap(flatten)]
    pub postgres: PostgresArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct PostgresArgs {
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    #[arg(long, env = "POSTGRES_DATABASE", default_value = "postgres")]
    pub postgres_database: String,

    #[arg(long, env = "POSTGRES_USERNAME", default_value = "postgres")]
    pub postgres_username: String,

    #[arg(long, env = "POSTGRES_PASSWORD")]
    pub postgres_password: Option<String>,

    #[arg(long, env = "POSTGRES_CA_CERT")]
    pub postgres_ca_cert: Option<String>,

    #[arg(long, env = "POSTGRES_SSL_MODE", default_value = "prefer")]
    pub postgres_ssl_mode: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RedisArgs {
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    pub redis_host: String,

    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    pub redis_port: u16,

    #[arg(long, env = "REDIS_USERNAME")]
    pub redis_username: Option<String>,

    #[arg(long, env = "REDIS_PASSWORD")]
    pub redis_password: Option<String>,

    #[arg(long, env = "REDIS_PROTO", default_value = "redis")]
    pub redis_proto: String,
}

impl RedisArgs {
    pub fn url_redacted(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}",
            if self.redis_proto.is_empty() {
                "redis"
            } else {
                &self.redis_proto
            },
            self.redis_username.as_deref().unwrap_or(""),
            self.redis_password.as_deref().map(|_| "****").unwrap_or(""),
            self.redis_host,
            self.redis_port
        )
    }

    pub fn url(&self) -> String {
        let proto = if self.redis_proto.is_empty() {
            "redis"
        } else {
            &self.redis_proto
        };
        let mut url = format!("{}://", proto);
        if let Some(ref username) = self.redis_username {
            url.push_str(username);
            if let Some(ref password) = self.redis_password {
                url.push(':');
                url.push_str(password);
            }
            url.push('@');
        } else if let Some(ref password) = self.redis_password {
            url.push(':');
            url.push_str(password);
            url.push('@');
        }
        url.push_str(&format!("{}:{}/", self.redis_host, self.redis_port));
        url
    }
}

/// One OIDC provider's federation config. The platform supports several
/// providers at once; the caller names which one in `login(provider)` and
/// `callback(provider, ...)`.
#[derive(Parser, Debug, Clone, serde::Deserialize)]
pub struct OidcProviderArgs {
    #[arg(long, env = "OIDC_PROVIDER_NAME", required = true)]
    pub name: String,

    #[arg(long, env = "OIDC_ISSUER", required = true)]
    pub issuer: String,

    #[arg(long, env = "OIDC_CLIENT_ID", required = true)]
    pub client_id: String,

    #[arg(long, env = "OIDC_CLIENT_SECRET", required = true)]
    pub client_secret: String,

    #[arg(long, env = "OIDC_REDIRECT_URL", required = true)]
    pub redirect_url: String,
}

#[derive(Parser, Debug, Clone)]
pub struct JwtArgs {
    /// Path to the PEM-encoded RSA private key used to sign access tokens.
    #[arg(long, env = "JWT_SIGNING_KEY_PATH", required = true)]
    pub signing_key_path: String,

    #[arg(long, env = "JWT_ISSUER", default_value = "https://auth.eosin.dev")]
    pub issuer: String,

    #[arg(long, env = "JWT_ACCESS_TOKEN_TTL_SECS", default_value_t = 900)]
    pub access_token_ttl_secs: i64,
}

/// Credentials for the external payment processor (Stripe-like), used by
/// the Billing Reconciler for both outbound calls and inbound webhook
/// signature verification.
#[derive(Parser, Debug, Clone)]
pub struct ProcessorArgs {
    #[arg(long, env = "PROCESSOR_API_KEY", required = true)]
    pub api_key: String,

    #[arg(long, env = "PROCESSOR_WEBHOOK_SECRET", required = true)]
    pub webhook_secret: String,
}

#[derive(Parser, Debug, Clone)]
pub struct HostClusterArgs {
    #[arg(long, env = "HOST_CLUSTER_KUBECONFIG")]
    pub kubeconfig_path: Option<String>,

    /// Externally reachable address vCluster kubeconfigs should advertise
    /// as the `server:` field, overriding the in-cluster address read
    /// from the vCluster secret.
    #[arg(long, env = "HOST_CLUSTER_EXTERNAL_SERVER")]
    pub external_server: Option<String>,
}

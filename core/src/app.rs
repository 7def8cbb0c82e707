use deadpool_postgres::Pool;
use eosin_common::rate_limit::RateLimiter;
use eosin_host_adapter::ClusterAdapter;
use std::ops::Deref;
use std::sync::Arc;

use crate::server::auth_middleware::JwksClient;

pub struct AppInner {
    pub db: Pool,
    pub rate_limiter: RateLimiter,
    pub adapter: Arc<dyn ClusterAdapter>,
    pub jwks: JwksClient,
    pub auth_issuer: String,
    pub http: reqwest::Client,
    pub kubeconfig_key: [u8; 32],
    pub webhook_secret: String,
    pub chat_upstream_base: String,
}

#[derive(Clone)]
pub struct App(Arc<AppInner>);

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Pool,
        rate_limiter: RateLimiter,
        adapter: Arc<dyn ClusterAdapter>,
        auth_issuer: String,
        http: reqwest::Client,
        kubeconfig_key: [u8; 32],
        webhook_secret: String,
        chat_upstream_base: String,
    ) -> Self {
        Self(Arc::new(AppInner {
            db,
            rate_limiter,
            adapter,
            jwks: JwksClient::new(),
            auth_issuer,
            http,
            kubeconfig_key,
            webhook_secret,
            chat_upstream_base,
        }))
    }
}

impl Deref for App {
    type Target = AppInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

use std::{ops::Deref, sync::Arc};

use deadpool_postgres::Pool as PgPool;
use eosin_common::rate_limit::RateLimiter;

use crate::keys::Keyset;
use crate::oidc::OidcRegistry;

pub struct JwtConfig {
    pub issuer: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

pub struct AppInner {
    pub db: PgPool,
    pub rate_limiter: RateLimiter,
    pub keyset: Keyset,
    pub oidc: OidcRegistry,
    pub jwt: JwtConfig,
}

#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl Deref for App {
    type Target = AppInner;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl App {
    pub fn new(
        db: PgPool,
        rate_limiter: RateLimiter,
        keyset: Keyset,
        oidc: OidcRegistry,
        jwt: JwtConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AppInner {
                db,
                rate_limiter,
                keyset,
                oidc,
                jwt,
            }),
        }
    }
}

//! `AuthenticatedUser`: verifies a bearer access token against Auth Core's
//! published JWKS. This service trusts the token's signature and claims
//! rather than re-deriving them, the same boundary auth's own protected
//! routes enforce on itself.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use eosin_common::auth::{BearerToken, Claims, parse_bearer};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};

use crate::app::App;
use crate::error::CoreError;

pub struct AuthenticatedUser(pub Claims);

impl FromRequestParts<App> for AuthenticatedUser {
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CoreError::Validation("missing Authorization header".to_string()))?;

        let token = match parse_bearer(header_value) {
            BearerToken::Present { token } => token,
            BearerToken::Absent => {
                return Err(CoreError::Validation("malformed Authorization header".to_string()));
            }
        };

        let header = decode_header(token)
            .map_err(|_| CoreError::Validation("malformed access token".to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| CoreError::Validation("access token missing kid".to_string()))?;

        let decoding_key = state
            .jwks
            .decoding_key_for(&state.http, &state.auth_issuer, &kid)
            .await
            .map_err(|_| CoreError::Validation("unknown signing key".to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&state.auth_issuer]);
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|_| CoreError::Validation("invalid access token".to_string()))?;
        Ok(AuthenticatedUser(data.claims))
    }
}

/// Caches Auth Core's published JWKS entries by `kid`, refetching on a
/// cache miss — the same pattern `eosin-auth`'s own OIDC federation client
/// uses for external providers' keysets.
pub struct JwksClient {
    cache: tokio::sync::RwLock<std::collections::HashMap<String, DecodingKey>>,
}

impl JwksClient {
    pub fn new() -> Self {
        Self {
            cache: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub async fn decoding_key_for(
        &self,
        http: &reqwest::Client,
        issuer: &str,
        kid: &str,
    ) -> anyhow::Result<DecodingKey> {
        if let Some(key) = self.cache.read().await.get(kid) {
            return Ok(key.clone());
        }
        self.refresh(http, issuer).await?;
        self.cache
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("kid {kid} not present in JWKS after refresh"))
    }

    async fn refresh(&self, http: &reqwest::Client, issuer: &str) -> anyhow::Result<()> {
        let url = format!("{issuer}/.well-known/jwks.json");
        let doc: serde_json::Value = http.get(&url).send().await?.json().await?;
        let mut cache = self.cache.write().await;
        cache.clear();
        for jwk in doc["keys"].as_array().cloned().unwrap_or_default() {
            let (Some(kid), Some(n), Some(e)) = (
                jwk["kid"].as_str(),
                jwk["n"].as_str(),
                jwk["e"].as_str(),
            ) else {
                continue;
            };
            let key = DecodingKey::from_rsa_components(n, e)?;
            cache.insert(kid.to_string(), key);
        }
        Ok(())
    }
}

impl Default for JwksClient {
    fn default() -> Self {
        Self::new()
    }
}

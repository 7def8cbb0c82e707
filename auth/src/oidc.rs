//! OIDC code-flow federation: authorization URL construction, code
//! exchange, and ID-token verification against the provider's published
//! JWKS. One `OidcProvider` per configured upstream identity provider.

use eosin_common::args::OidcProviderArgs;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("invalid id_token: {0}")]
    InvalidIdToken(String),
}

#[derive(Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: String,
    token_endpoint: String,
    jwks_uri: String,
}

#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<JwkEntry>,
}

#[derive(Deserialize, Clone)]
struct JwkEntry {
    kid: String,
    n: String,
    e: String,
}

#[derive(Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    access_token: Option<String>,
}

pub struct OidcProvider {
    pub config: OidcProviderArgs,
    http: reqwest::Client,
    jwks_cache: RwLock<HashMap<String, JwkEntry>>,
}

pub struct OidcRegistry {
    providers: HashMap<String, OidcProvider>,
}

impl OidcRegistry {
    pub fn new(configs: Vec<OidcProviderArgs>, http: reqwest::Client) -> Self {
        let providers = configs
            .into_iter()
            .map(|c| {
                (
                    c.name.clone(),
                    OidcProvider {
                        config: c,
                        http: http.clone(),
                        jwks_cache: RwLock::new(HashMap::new()),
                    },
                )
            })
            .collect();
        Self { providers }
    }

    pub fn get(&self, name: &str) -> Result<&OidcProvider, OidcError> {
        self.providers
            .get(name)
            .ok_or_else(|| OidcError::UnknownProvider(name.to_string()))
    }
}

impl OidcProvider {
    async fn discovery(&self) -> Result<DiscoveryDocument, OidcError> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            self.config.issuer.trim_end_matches('/')
        );
        self.http
            .get(url)
            .send()
            .await
            .map_err(|e| OidcError::Upstream(e.to_string()))?
            .json::<DiscoveryDocument>()
            .await
            .map_err(|e| OidcError::Upstream(e.to_string()))
    }

    pub async fn authorization_url(
        &self,
        state: &str,
        code_challenge: &str,
    ) -> Result<String, OidcError> {
        let discovery = self.discovery().await?;
        let mut url = url::Url::parse(&discovery.authorization_endpoint)
            .map_err(|e| OidcError::Upstream(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("scope", "openid email profile")
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");
        Ok(url.to_string())
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<IdTokenClaims, OidcError> {
        let discovery = self.discovery().await?;
        let response = self
            .http
            .post(&discovery.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_url),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await
            .map_err(|e| OidcError::Upstream(e.to_string()))?;
        if !response.status().is_success() {
            return Err(OidcError::Upstream(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| OidcError::Upstream(e.to_string()))?;
        self.verify_id_token(&token_response.id_token, &discovery.jwks_uri)
            .await
    }

    async fn jwk_for(&self, kid: &str, jwks_uri: &str) -> Result<JwkEntry, OidcError> {
        if let Some(jwk) = self.jwks_cache.read().await.get(kid).cloned() {
            return Ok(jwk);
        }
        let doc: JwksDocument = self
            .http
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| OidcError::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| OidcError::Upstream(e.to_string()))?;
        let mut cache = self.jwks_cache.write().await;
        for entry in doc.keys {
            cache.insert(entry.kid.clone(), entry);
        }
        cache
            .get(kid)
            .cloned()
            .ok_or_else(|| OidcError::InvalidIdToken(format!("kid {kid} not in provider JWKS")))
    }

    async fn verify_id_token(
        &self,
        id_token: &str,
        jwks_uri: &str,
    ) -> Result<IdTokenClaims, OidcError> {
        let header =
            decode_header(id_token).map_err(|e| OidcError::InvalidIdToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| OidcError::InvalidIdToken("missing kid".to_string()))?;
        let jwk = self.jwk_for(&kid, jwks_uri).await?;
        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| OidcError::InvalidIdToken(e.to_string()))?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.config.client_id]);
        validation.set_issuer(&[&self.config.issuer]);
        let data = decode::<IdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| OidcError::InvalidIdToken(e.to_string()))?;
        Ok(data.claims)
    }
}

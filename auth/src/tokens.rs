//! Token formats (spec §6): access token is an RS256 JWT, refresh token
//! is 32 random bytes returned as hex, session salt is 32 random bytes
//! stored as hex, and the stored hash is `SHA-256(token ∥ salt)` hex.

use crate::keys::Keyset;
use chrono::Utc;
use eosin_common::auth::Claims;
use jsonwebtoken::{Algorithm, Header, encode};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

pub struct IssuedAccessToken {
    pub token: String,
    pub jti: String,
    pub expires_at: chrono::DateTime<Utc>,
}

pub fn random_hex_bytes(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `SHA-256(bytes(token) ∥ bytes(salt))`: both inputs are given as hex
/// strings but hashed as the raw bytes they decode to, per spec §6's token
/// format. Malformed hex (shouldn't happen; both sides generate via
/// `random_hex_bytes`) hashes the hex string itself rather than panicking,
/// so a corrupt stored value fails comparison instead of crashing a request.
pub fn hash_refresh_token(token_hex: &str, salt_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hex::decode(token_hex).unwrap_or_else(|_| token_hex.as_bytes().to_vec()));
    hasher.update(hex::decode(salt_hex).unwrap_or_else(|_| salt_hex.as_bytes().to_vec()));
    hex::encode(hasher.finalize())
}

pub fn verify_refresh_token(token_hex: &str, salt_hex: &str, stored_hash_hex: &str) -> bool {
    let recomputed = hash_refresh_token(token_hex, salt_hex);
    eosin_common::auth::constant_time_eq(recomputed.as_bytes(), stored_hash_hex.as_bytes())
}

pub fn issue_access_token(
    keyset: &Keyset,
    issuer: &str,
    ttl_secs: i64,
    user_id: &str,
    email: &str,
    org_roles: HashMap<String, String>,
) -> jsonwebtoken::errors::Result<IssuedAccessToken> {
    let (kid, encoding_key) = keyset.encoding_key_for_current();
    let now = Utc::now();
    let expires_at = now + chrono::Duration::seconds(ttl_secs);
    let jti = Uuid::new_v4().to_string();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        org_roles,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: jti.clone(),
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid);
    let token = encode(&header, &claims_with_issuer(&claims, issuer), &encoding_key)?;
    Ok(IssuedAccessToken {
        token,
        jti,
        expires_at,
    })
}

#[derive(serde::Serialize)]
struct ClaimsWithIssuer<'a> {
    #[serde(flatten)]
    claims: &'a Claims,
    iss: &'a str,
}

fn claims_with_issuer<'a>(claims: &'a Claims, issuer: &'a str) -> ClaimsWithIssuer<'a> {
    ClaimsWithIssuer { claims, iss: issuer }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SigningKey;

    const TEST_KEY_PEM: &str = include_str!("../testdata/test_rsa_key.pem");

    #[test]
    fn refresh_hash_round_trips() {
        let token = random_hex_bytes(32);
        let salt = random_hex_bytes(32);
        let hash = hash_refresh_token(&token, &salt);
        assert!(verify_refresh_token(&token, &salt, &hash));
        assert!(!verify_refresh_token("deadbeef", &salt, &hash));
    }

    #[test]
    fn access_token_is_signed_and_decodable() {
        let key = SigningKey::from_pem("kid-1", TEST_KEY_PEM).unwrap();
        let keyset = Keyset::new(key);
        let issued = issue_access_token(
            &keyset,
            "https://auth.eosin.dev",
            900,
            "usr-1",
            "a@b.com",
            HashMap::new(),
        )
        .unwrap();
        assert!(!issued.token.is_empty());
        assert!(issued.expires_at > Utc::now());
    }
}

//! RSA signing keyset for access tokens, and the JWKS document derived
//! from it. A fresh key can be rotated in without invalidating tokens
//! signed under the previous one: verification tries every key in the
//! set, keyed by `kid`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde::Serialize;
use std::sync::RwLock;

pub struct SigningKey {
    pub kid: String,
    pub encoding_key: EncodingKey,
    pub decoding_key: DecodingKey,
    n: Vec<u8>,
    e: Vec<u8>,
}

impl SigningKey {
    pub fn from_pem(kid: impl Into<String>, pem: &str) -> anyhow::Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| anyhow::anyhow!("invalid RSA private key: {e}"))?;
        let n = private.n().to_bytes_be();
        let e = private.e().to_bytes_be();
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())?;
        let decoding_key = DecodingKey::from_rsa_pem(
            rsa::pkcs1::EncodeRsaPublicKey::to_pkcs1_pem(
                &private.to_public_key(),
                rsa::pkcs1::LineEnding::LF,
            )?
            .as_bytes(),
        )?;
        Ok(Self {
            kid: kid.into(),
            encoding_key,
            decoding_key,
            n,
            e,
        })
    }

    fn jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA",
            use_: "sig",
            alg: "RS256",
            kid: self.kid.clone(),
            n: URL_SAFE_NO_PAD.encode(&self.n),
            e: URL_SAFE_NO_PAD.encode(&self.e),
        }
    }
}

#[derive(Serialize)]
struct Jwk {
    kty: &'static str,
    #[serde(rename = "use")]
    use_: &'static str,
    alg: &'static str,
    kid: String,
    n: String,
    e: String,
}

#[derive(Serialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

/// The active signing key plus any still-valid-for-verification previous
/// keys. The only in-memory shared state this service carries besides
/// connection pools, matching spec §5.
pub struct Keyset {
    inner: RwLock<Vec<SigningKey>>,
}

impl Keyset {
    pub fn new(current: SigningKey) -> Self {
        Self {
            inner: RwLock::new(vec![current]),
        }
    }

    pub fn current_kid(&self) -> String {
        self.inner.read().unwrap().first().unwrap().kid.clone()
    }

    pub fn encoding_key_for_current(&self) -> (String, jsonwebtoken::EncodingKey) {
        let guard = self.inner.read().unwrap();
        let current = guard.first().unwrap();
        (current.kid.clone(), current.encoding_key.clone())
    }

    pub fn decoding_key_for(&self, kid: &str) -> Option<DecodingKey> {
        self.inner
            .read()
            .unwrap()
            .iter()
            .find(|k| k.kid == kid)
            .map(|k| k.decoding_key.clone())
    }

    /// Installs `next` as the current signing key, demoting the previous
    /// current key to verification-only. Keeps at most 3 keys, matching
    /// the rotation window a ~15 minute access token lifetime needs.
    pub fn rotate(&self, next: SigningKey) {
        let mut guard = self.inner.write().unwrap();
        guard.insert(0, next);
        guard.truncate(3);
    }

    pub fn jwks_json(&self) -> serde_json::Value {
        let guard = self.inner.read().unwrap();
        let set = JwkSet {
            keys: guard.iter().map(SigningKey::jwk).collect(),
        };
        serde_json::to_value(set).expect("jwk set always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY_PEM: &str = include_str!("../testdata/test_rsa_key.pem");

    #[test]
    fn jwks_document_carries_the_current_key() {
        let key = SigningKey::from_pem("kid-1", TEST_KEY_PEM).unwrap();
        let keyset = Keyset::new(key);
        let jwks = keyset.jwks_json();
        let keys = jwks.get("keys").unwrap().as_array().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].get("kid").unwrap(), "kid-1");
    }

    #[test]
    fn rotation_keeps_old_key_verifiable() {
        let key1 = SigningKey::from_pem("kid-1", TEST_KEY_PEM).unwrap();
        let keyset = Keyset::new(key1);
        let key2 = SigningKey::from_pem("kid-2", TEST_KEY_PEM).unwrap();
        keyset.rotate(key2);
        assert_eq!(keyset.current_kid(), "kid-2");
        assert!(keyset.decoding_key_for("kid-1").is_some());
    }
}

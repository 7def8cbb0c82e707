//! PKCE (RFC 7636) code-verifier/challenge handling and the state nonce
//! that binds an authorization request to its callback.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const STATE_TTL_SECS: i64 = 600; // spec §3: OAuthState expiry ≤ 10 min

/// 32 random bytes, base64url-encoded, used as both the state nonce and
/// the PKCE code verifier.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Derives the S256 code challenge for a given verifier.
pub fn code_challenge_s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_is_deterministic_and_sized() {
        let verifier = "abc123";
        let a = code_challenge_s256(verifier);
        let b = code_challenge_s256(verifier);
        assert_eq!(a, b);
        // SHA-256 digest, base64url no-pad, is 43 chars.
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn different_verifiers_yield_different_challenges() {
        assert_ne!(code_challenge_s256("a"), code_challenge_s256("b"));
    }
}

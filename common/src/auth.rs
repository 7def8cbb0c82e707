//! Primitives shared between the Auth Core (which issues and verifies
//! tokens) and every other service (which only verifies them): the JWT
//! claim shape, bearer-header parsing, and a constant-time byte compare
//! for refresh-token hash verification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The access-token payload. `org_roles` maps organization id to the
/// caller's role within it, so services can authorize without a second
/// round trip to the Persistence Store on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub org_roles: HashMap<String, String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Result of parsing an `Authorization` header value.
pub enum BearerToken<'a> {
    /// A canonical `Bearer <token>` prefix (case-insensitive keyword,
    /// exactly one space, no leading whitespace on the header value) was
    /// found; `token` is everything after it.
    Present { token: &'a str },
    /// The header did not have the canonical prefix. Per spec §9's
    /// resolution of the bearer-prefix open question, this implementation
    /// treats any non-canonical shape (leading whitespace, wrong casing
    /// boundary, missing separator) as absent rather than guessing at a
    /// partial trim.
    Absent,
}

/// Parses the `Authorization` header value looking for a case-insensitive
/// `"Bearer "` prefix with no leading whitespace and exactly one
/// separating space, per the boundary tests in spec §8.
pub fn parse_bearer(header_value: &str) -> BearerToken<'_> {
    const PREFIX_LEN: usize = "Bearer ".len();
    if header_value.len() < PREFIX_LEN {
        return BearerToken::Absent;
    }
    let (prefix, rest) = header_value.split_at(PREFIX_LEN);
    if prefix.eq_ignore_ascii_case("Bearer ") {
        BearerToken::Present { token: rest }
    } else {
        BearerToken::Absent
    }
}

/// Constant-time equality for comparing a recomputed refresh-token hash
/// against the stored one. Short-circuiting on length first is safe: the
/// length of a hex-encoded SHA-256 digest is not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_bearer_is_detected_and_trimmed() {
        match parse_bearer("Bearer x") {
            BearerToken::Present { token } => assert_eq!(token, "x"),
            BearerToken::Absent => panic!("expected Present"),
        }
    }

    #[test]
    fn case_insensitive_bearer_is_detected() {
        for header in ["bearer x", "BEARER x", "BeArEr x"] {
            match parse_bearer(header) {
                BearerToken::Present { token } => assert_eq!(token, "x"),
                BearerToken::Absent => panic!("expected Present for {header}"),
            }
        }
    }

    #[test]
    fn missing_separator_is_absent() {
        assert!(matches!(parse_bearer("Bearertoken"), BearerToken::Absent));
    }

    #[test]
    fn leading_whitespace_is_absent() {
        assert!(matches!(parse_bearer(" Bearer x"), BearerToken::Absent));
    }

    #[test]
    fn constant_time_eq_matches_equal_and_rejects_different() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}

//! The `AuthenticatedUser` extractor: verifies a bearer access token issued
//! by this service's own keyset and yields its claims. Used by every
//! protected route.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use eosin_common::auth::{BearerToken, Claims, parse_bearer};
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};

use crate::app::App;
use crate::error::AuthError;

pub struct AuthenticatedUser(pub Claims);

impl FromRequestParts<App> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::Unauthenticated)?;

        let token = match parse_bearer(header_value) {
            BearerToken::Present { token } => token,
            BearerToken::Absent => return Err(AuthError::Unauthenticated),
        };

        let header = decode_header(token).map_err(|_| AuthError::Unauthenticated)?;
        let kid = header.kid.ok_or(AuthError::Unauthenticated)?;
        let decoding_key = state
            .keyset
            .decoding_key_for(&kid)
            .ok_or(AuthError::Unauthenticated)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&state.jwt.issuer]);
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|_| AuthError::Unauthenticated)?;
        Ok(AuthenticatedUser(data.claims))
    }
}

use eosin_common::error::{ApiError, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("invalid or expired authorization state")]
    InvalidState,

    #[error("invalid credentials")]
    Unauthenticated,

    #[error("refresh token reused")]
    TokenReused,

    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("upstream provider error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Db(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError for AuthError {
    fn kind(&self) -> ErrorKind {
        match self {
            AuthError::UnknownProvider(_) | AuthError::Validation(_) => ErrorKind::Validation,
            AuthError::InvalidState | AuthError::Unauthenticated => ErrorKind::Authentication,
            AuthError::TokenReused => ErrorKind::TokenReused,
            AuthError::NotFound => ErrorKind::NotFound,
            AuthError::Forbidden => ErrorKind::Authorization,
            AuthError::Upstream(_) => ErrorKind::Upstream,
            AuthError::Db(_) | AuthError::Pool(_) | AuthError::Jwt(_) | AuthError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<crate::oidc::OidcError> for AuthError {
    fn from(e: crate::oidc::OidcError) -> Self {
        match e {
            crate::oidc::OidcError::UnknownProvider(p) => AuthError::UnknownProvider(p),
            crate::oidc::OidcError::Upstream(msg) => AuthError::Upstream(msg),
            crate::oidc::OidcError::InvalidIdToken(msg) => AuthError::Validation(msg),
        }
    }
}

eosin_common::impl_into_response!(AuthError);

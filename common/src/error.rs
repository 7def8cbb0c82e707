//! The error-kind taxonomy every component's top-level error enum maps
//! onto. The HTTP boundary is the only place `ErrorKind` becomes a status
//! code; everything below it returns typed errors and wraps with context.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    Conflict,
    NotFound,
    Upstream,
    TokenReused,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            ErrorKind::TokenReused => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub trait ApiError: std::error::Error {
    fn kind(&self) -> ErrorKind;

    /// The message returned to the caller. Must never contain SQL
    /// fragments, stack traces, or internal identifiers; defaults to the
    /// error's `Display` impl, which each component's enum keeps user-safe
    /// by construction.
    fn user_message(&self) -> String {
        self.to_string()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Wraps any [`ApiError`] into the `{"error": "..."}` JSON body the
/// external interface contract (spec §6) requires, logging Internal-kind
/// errors with their full chain and a correlation id pulled from the
/// active `tracing` span.
pub fn into_response<E: ApiError>(err: &E) -> Response {
    let kind = err.kind();
    if kind == ErrorKind::Internal {
        tracing::error!(error = %err, "internal error");
    } else {
        tracing::warn!(error = %err, kind = ?kind, "request rejected");
    }
    (kind.status(), axum::Json(ErrorBody { error: err.user_message() })).into_response()
}

/// Convenience for error enums that want `IntoResponse` for free once they
/// implement [`ApiError`]. Call from a thin wrapper type per component
/// rather than blanket-impling `IntoResponse` for every `ApiError`, since
/// axum forbids overlapping foreign impls.
#[macro_export]
macro_rules! impl_into_response {
    ($ty:ty) => {
        impl axum::response::IntoResponse for $ty {
            fn into_response(self) -> axum::response::Response {
                $crate::error::into_response(&self)
            }
        }
    };
}

use eosin_common::error::{ApiError, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("workspace is not ready: {0}")]
    NotReady(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Db(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    HostAdapter(#[from] eosin_host_adapter::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError for CoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound => ErrorKind::NotFound,
            CoreError::Forbidden => ErrorKind::Authorization,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::NotReady(_) => ErrorKind::Conflict,
            CoreError::Upstream(_) => ErrorKind::Upstream,
            CoreError::Db(_) | CoreError::Pool(_) | CoreError::HostAdapter(_) | CoreError::Internal(_) => {
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

eosin_common::impl_into_response!(CoreError);

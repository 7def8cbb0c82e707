#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("chart load failed: {0}")]
    ChartLoad(String),

    #[error("cluster unreachable: {0}")]
    ClusterUnreachable(String),

    #[error("release failed: {0}")]
    ReleaseFailed(String),

    #[error("release not ready before deadline: {0}")]
    NotReady(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

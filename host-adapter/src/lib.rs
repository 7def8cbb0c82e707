//! The Host Cluster Adapter: a narrow capability interface over the
//! shared Kubernetes host cluster, consumed by the Task Runner's CREATE,
//! DELETE, UPDATE_PLAN and SETUP_HNC handlers.
//!
//! The adapter never reads the Persistence Store. It receives fully
//! resolved arguments and returns either a successful result or one of
//! the typed [`Error`] variants the Task Runner maps onto retriable vs
//! terminal task outcomes.

mod error;
pub mod fake;
pub mod helm;
pub mod quota;

pub use error::Error;

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct ReleaseValues(pub serde_json::Value);

#[async_trait]
pub trait ClusterAdapter: Send + Sync {
    /// Install the named release if absent, otherwise upgrade it in place.
    /// Creates `namespace` when installing.
    async fn install_or_upgrade(
        &self,
        release_name: &str,
        chart_path: &str,
        namespace: &str,
        values: &ReleaseValues,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<()>;

    /// Idempotent. An absent release is treated as already-uninstalled.
    async fn uninstall(
        &self,
        release_name: &str,
        namespace: &str,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<()>;

    /// Polls release status until ready or `deadline` elapses.
    async fn wait_ready(
        &self,
        release_name: &str,
        namespace: &str,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<()>;

    /// Reads the vCluster's generated kubeconfig secret and rewrites the
    /// server URL to the externally reachable address. Returns raw YAML.
    async fn extract_kubeconfig(&self, release_name: &str, namespace: &str) -> Result<String>;

    /// Creates or updates the namespace's `ResourceQuota`. Idempotent.
    async fn apply_resource_quotas(
        &self,
        namespace: &str,
        quota: &quota::QuotaSpec,
    ) -> Result<()>;
}

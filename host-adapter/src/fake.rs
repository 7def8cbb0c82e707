use crate::quota::QuotaSpec;
use crate::{ClusterAdapter, Error, ReleaseValues, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// An in-memory stand-in for the real Kubernetes/Helm boundary, used by
/// Task Runner and Workspace Service tests so they can assert on
/// side-effect counts without a live cluster.
#[derive(Default)]
pub struct FakeClusterAdapter {
    releases: Mutex<HashSet<String>>,
    fail_install: Mutex<HashSet<String>>,
}

impl FakeClusterAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_install(&self, release_name: &str) {
        self.fail_install
            .lock()
            .unwrap()
            .insert(release_name.to_string());
    }

    pub fn has_release(&self, release_name: &str) -> bool {
        self.releases.lock().unwrap().contains(release_name)
    }

    pub fn release_count(&self) -> usize {
        self.releases.lock().unwrap().len()
    }
}

#[async_trait]
impl ClusterAdapter for FakeClusterAdapter {
    async fn install_or_upgrade(
        &self,
        release_name: &str,
        _chart_path: &str,
        _namespace: &str,
        _values: &ReleaseValues,
        _cancel: &CancellationToken,
        _deadline: Duration,
    ) -> Result<()> {
        if self.fail_install.lock().unwrap().remove(release_name) {
            return Err(Error::ReleaseFailed(release_name.to_string()));
        }
        self.releases
            .lock()
            .unwrap()
            .insert(release_name.to_string());
        Ok(())
    }

    async fn uninstall(
        &self,
        release_name: &str,
        _namespace: &str,
        _cancel: &CancellationToken,
        _deadline: Duration,
    ) -> Result<()> {
        self.releases.lock().unwrap().remove(release_name);
        Ok(())
    }

    async fn wait_ready(
        &self,
        release_name: &str,
        _namespace: &str,
        _cancel: &CancellationToken,
        _deadline: Duration,
    ) -> Result<()> {
        if self.releases.lock().unwrap().contains(release_name) {
            Ok(())
        } else {
            Err(Error::NotReady(release_name.to_string()))
        }
    }

    async fn extract_kubeconfig(&self, release_name: &str, _namespace: &str) -> Result<String> {
        Ok(format!(
            "apiVersion: v1\nkind: Config\nclusters:\n- cluster:\n    server: https://{release_name}.vcluster.local:443\n  name: {release_name}\n"
        ))
    }

    async fn apply_resource_quotas(&self, _namespace: &str, _quota: &QuotaSpec) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_then_uninstall_round_trip() {
        let adapter = FakeClusterAdapter::new();
        let cancel = CancellationToken::new();
        adapter
            .install_or_upgrade(
                "ws-abc",
                "charts/vcluster",
                "ws-abc",
                &ReleaseValues(serde_json::json!({})),
                &cancel,
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert!(adapter.has_release("ws-abc"));
        assert_eq!(adapter.release_count(), 1);
        adapter
            .uninstall("ws-abc", "ws-abc", &cancel, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!adapter.has_release("ws-abc"));
    }

    #[tokio::test]
    async fn failed_install_surfaces_release_failed() {
        let adapter = FakeClusterAdapter::new();
        adapter.fail_next_install("ws-bad");
        let cancel = CancellationToken::new();
        let err = adapter
            .install_or_upgrade(
                "ws-bad",
                "charts/vcluster",
                "ws-bad",
                &ReleaseValues(serde_json::json!({})),
                &cancel,
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReleaseFailed(_)));
    }
}

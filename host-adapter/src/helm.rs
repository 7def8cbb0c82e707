use crate::quota::QuotaSpec;
use crate::{ClusterAdapter, Error, ReleaseValues, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    Api, Client,
    api::{DynamicObject, Patch, PatchParams},
    core::GroupVersionKind,
};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const HELM_BIN: &str = "helm";
const MANAGER_NAME: &str = "eosin-host-adapter";

/// Drives the host cluster by shelling out to the `helm` binary and
/// talking to the Kubernetes API directly via `kube::Client`, matching
/// the shape of an operator running on a cluster with `helm` on `PATH`.
pub struct HelmAdapter {
    client: Client,
    kubeconfig_server_override: Option<String>,
}

impl HelmAdapter {
    pub async fn new(kubeconfig_server_override: Option<String>) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self {
            client,
            kubeconfig_server_override,
        })
    }

    async fn run_helm(&self, args: &[&str], stdin_yaml: Option<&str>) -> Result<String> {
        let mut cmd = Command::new(HELM_BIN);
        cmd.args(args);
        if stdin_yaml.is_some() {
            cmd.stdin(Stdio::piped());
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Other(format!("failed to spawn helm: {e}")))?;
        if let Some(values) = stdin_yaml {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(values.as_bytes())
                    .await
                    .map_err(|e| Error::Other(format!("failed to write helm stdin: {e}")))?;
            }
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Other(format!("failed to wait on helm: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(Error::ReleaseFailed(format!(
                "helm {:?} failed: {stderr}",
                args
            )));
        }
        Ok(stdout)
    }
}

#[async_trait]
impl ClusterAdapter for HelmAdapter {
    async fn install_or_upgrade(
        &self,
        release_name: &str,
        chart_path: &str,
        namespace: &str,
        values: &ReleaseValues,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<()> {
        let values_yaml = serde_yaml::to_string(&values.0)?;
        let args = vec![
            "upgrade",
            release_name,
            chart_path,
            "--install",
            "--namespace",
            namespace,
            "--create-namespace",
            "--history-max",
            "5",
            "-f",
            "-",
        ];
        let fut = self.run_helm(&args, Some(&values_yaml));
        tokio::select! {
            res = timeout(deadline, fut) => {
                match res {
                    Ok(inner) => inner.map(|_| ()),
                    Err(_) => Err(Error::ReleaseFailed(format!("{release_name}: install/upgrade timed out"))),
                }
            }
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    async fn uninstall(
        &self,
        release_name: &str,
        namespace: &str,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<()> {
        let args = vec!["uninstall", release_name, "--namespace", namespace];
        let fut = self.run_helm(&args, None);
        tokio::select! {
            res = timeout(deadline, fut) => {
                match res {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(Error::ReleaseFailed(msg))) if msg.contains("not found") => {
                        info!(release_name, "uninstall: release already absent");
                        Ok(())
                    }
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(Error::ReleaseFailed(format!("{release_name}: uninstall timed out"))),
                }
            }
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    async fn wait_ready(
        &self,
        release_name: &str,
        namespace: &str,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<()> {
        let start = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if start.elapsed() > deadline {
                return Err(Error::NotReady(format!(
                    "{release_name} in {namespace} did not become ready"
                )));
            }
            let status = self
                .run_helm(&["status", release_name, "--namespace", namespace, "-o", "json"], None)
                .await;
            match status {
                Ok(raw) => {
                    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
                    let phase = parsed
                        .get("info")
                        .and_then(|i| i.get("status"))
                        .and_then(|s| s.as_str())
                        .unwrap_or("");
                    if phase == "deployed" {
                        return Ok(());
                    }
                }
                Err(e) => warn!(%e, release_name, "wait_ready: status poll failed, retrying"),
            }
            tokio::select! {
                _ = sleep(Duration::from_secs(3)) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }

    async fn extract_kubeconfig(&self, release_name: &str, namespace: &str) -> Result<String> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret_name = format!("vc-{release_name}");
        let secret = secrets.get(&secret_name).await?;
        let data = secret
            .data
            .ok_or_else(|| Error::Other(format!("secret {secret_name} has no data")))?;
        let raw = data
            .get("config")
            .ok_or_else(|| Error::Other(format!("secret {secret_name} missing 'config' key")))?;
        let mut kubeconfig = String::from_utf8(raw.0.clone())
            .map_err(|e| Error::Other(format!("kubeconfig is not utf8: {e}")))?;
        if let Some(server) = &self.kubeconfig_server_override {
            kubeconfig = rewrite_server_url(&kubeconfig, server);
        }
        Ok(kubeconfig)
    }

    async fn apply_resource_quotas(&self, namespace: &str, quota: &QuotaSpec) -> Result<()> {
        let name = "workspace-quota";
        let gvk = GroupVersionKind::gvk("", "v1", "ResourceQuota");
        let api_resource = kube::discovery::ApiResource::from_gvk(&gvk);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &api_resource);
        let body = quota.to_resource_quota_json(name, namespace);
        let obj: DynamicObject = serde_json::from_value(body)?;
        api.patch(
            name,
            &PatchParams::apply(MANAGER_NAME).force(),
            &Patch::Apply(&obj),
        )
        .await?;
        Ok(())
    }
}

fn rewrite_server_url(kubeconfig: &str, server: &str) -> String {
    let mut out = String::with_capacity(kubeconfig.len());
    for line in kubeconfig.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("server:") {
            let indent = &line[..line.len() - trimmed.len()];
            out.push_str(&format!("{indent}server: {server}\n"));
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_server_url_preserves_indent() {
        let kubeconfig = "clusters:\n- cluster:\n    server: https://10.0.0.1:6443\n  name: vc\n";
        let rewritten = rewrite_server_url(kubeconfig, "https://vc.example.com:443");
        assert!(rewritten.contains("    server: https://vc.example.com:443\n"));
        assert!(rewritten.contains("  name: vc\n"));
    }
}
